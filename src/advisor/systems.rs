//! Systems driving the consequence round-trip: dispatch, polling, and decisions.
use std::sync::Arc;

use bevy::{
    prelude::*,
    tasks::{block_on, futures_lite::future, AsyncComputeTaskPool, Task, TaskPool},
};

use crate::{
    ledger::{
        errors::LedgerError,
        events::{LedgerAppliedEvent, LedgerChange, LedgerRejectedEvent},
        systems::{commit_transition, recorded, unknown_child},
        types::RecordStamp,
    },
    store::LedgerStore,
};

use super::{
    broker::ConsequenceAdvisor,
    errors::{AdvisorError, AdvisorErrorKind},
    events::{
        ConsequenceDecision, ConsequenceFailedEvent, ConsequenceRequested,
        ConsequenceSettledEvent, ConsequenceSuggestedEvent,
    },
    pending::{CancellationToken, ConsequenceDraft, PendingConsequence, ResolveOutcome},
    types::{AdvisorRequestId, ConsequenceRequest, ConsequenceResponse},
};

type AdvisorResult = Result<ConsequenceResponse, AdvisorError>;

/// The advisor every request is routed to.
#[derive(Resource, Clone)]
pub struct ActiveConsequenceAdvisor(Arc<dyn ConsequenceAdvisor>);

impl ActiveConsequenceAdvisor {
    pub fn new(advisor: Arc<dyn ConsequenceAdvisor>) -> Self {
        Self(advisor)
    }

    pub fn advisor(&self) -> &dyn ConsequenceAdvisor {
        self.0.as_ref()
    }
}

struct InFlightRequest {
    request_id: AdvisorRequestId,
    token: CancellationToken,
    task: Task<AdvisorResult>,
}

/// Advisor calls running on the async compute pool.
#[derive(Resource, Default)]
pub struct AdvisorTasks {
    in_flight: Vec<InFlightRequest>,
}

impl AdvisorTasks {
    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.in_flight.is_empty()
    }
}

pub fn start_consequence_requests(
    mut requests: MessageReader<ConsequenceRequested>,
    store: Res<LedgerStore>,
    advisor: Res<ActiveConsequenceAdvisor>,
    mut pending: ResMut<PendingConsequence>,
    mut tasks: ResMut<AdvisorTasks>,
    mut rejected: MessageWriter<LedgerRejectedEvent>,
) {
    for requested in requests.read() {
        let Some(child) = store.state().child(&requested.child_id) else {
            rejected.write(LedgerRejectedEvent {
                error: unknown_child(&requested.child_id),
            });
            continue;
        };

        let draft = ConsequenceDraft::new(child.id().clone(), requested.behavior.trim());
        let (request_id, token) = match pending.begin(draft) {
            Ok(started) => started,
            Err(error) => {
                rejected.write(LedgerRejectedEvent { error });
                continue;
            }
        };

        let request = ConsequenceRequest::new(child.name(), child.age(), requested.behavior.trim());
        let advisor = Arc::clone(&advisor.0);
        let task_token = token.clone();
        let task = AsyncComputeTaskPool::get_or_init(TaskPool::new).spawn(async move {
            if task_token.is_cancelled() {
                return Err(AdvisorError::new(
                    request_id,
                    advisor.provider_kind(),
                    AdvisorErrorKind::Cancelled,
                ));
            }
            advisor.suggest(request_id, &request)
        });

        debug!(
            "Dispatched advisor request {} for {}",
            request_id,
            child.name()
        );
        tasks.in_flight.push(InFlightRequest {
            request_id,
            token,
            task,
        });
    }
}

pub fn poll_consequence_tasks(
    mut tasks: ResMut<AdvisorTasks>,
    mut pending: ResMut<PendingConsequence>,
    mut suggested: MessageWriter<ConsequenceSuggestedEvent>,
    mut failed: MessageWriter<ConsequenceFailedEvent>,
) {
    tasks.in_flight.retain_mut(|entry| {
        let Some(result) = block_on(future::poll_once(&mut entry.task)) else {
            return true;
        };

        if entry.token.is_cancelled() {
            debug!("Dropping result of cancelled request {}", entry.request_id);
            return false;
        }

        match pending.resolve(entry.request_id, result.clone()) {
            ResolveOutcome::Accepted => match result {
                Ok(response) => {
                    info!(
                        "Advisor suggested a {}-point deduction ({})",
                        response.suggestion.points_deduction, response.request_id
                    );
                    suggested.write(ConsequenceSuggestedEvent { response });
                }
                Err(error) => {
                    warn!("{}", error);
                    failed.write(ConsequenceFailedEvent { error });
                }
            },
            ResolveOutcome::Stale => {
                debug!("Ignoring stale advisor result {}", entry.request_id);
            }
        }
        false
    });
}

pub fn apply_consequence_decisions(
    mut decisions: MessageReader<ConsequenceDecision>,
    mut pending: ResMut<PendingConsequence>,
    mut store: ResMut<LedgerStore>,
    mut applied: MessageWriter<LedgerAppliedEvent>,
    mut rejected: MessageWriter<LedgerRejectedEvent>,
    mut settled: MessageWriter<ConsequenceSettledEvent>,
) {
    for decision in decisions.read() {
        match decision {
            ConsequenceDecision::Discard => {
                pending.discard();
                settled.write(ConsequenceSettledEvent {
                    decision: *decision,
                });
            }
            ConsequenceDecision::Confirm => {
                let outcome = match pending.draft().map(|draft| draft.child_id.clone()) {
                    Some(child_id) => pending
                        .confirm(store.state(), RecordStamp::now())
                        .and_then(|next| recorded(next, &child_id)),
                    None => Err(LedgerError::invalid_input(
                        "consequence",
                        "no draft to confirm",
                    )),
                }
                .and_then(|(next, child_id, change)| {
                    commit_transition(&mut store, next)?;
                    Ok(LedgerAppliedEvent { child_id, change })
                });

                match outcome {
                    Ok(event) => {
                        pending.clear();
                        applied.write(event);
                        settled.write(ConsequenceSettledEvent {
                            decision: *decision,
                        });
                    }
                    Err(error) => {
                        info!("Consequence confirmation rejected: {}", error);
                        rejected.write(LedgerRejectedEvent { error });
                    }
                }
            }
        }
    }
}

/// Switching to another child abandons the draft made for the previous one.
pub fn cancel_consequence_on_selection(
    mut applied: MessageReader<LedgerAppliedEvent>,
    mut pending: ResMut<PendingConsequence>,
) {
    for event in applied.read() {
        if event.change == LedgerChange::Selected {
            pending.retarget(&event.child_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{thread, time::Duration};

    use super::*;
    use crate::{
        advisor::{
            broker::{AdvisorProviderKind, FallbackConsequenceAdvisor},
            pending::PendingStage,
            types::ConsequenceSuggestion,
        },
        ledger::{engine::add_child, state::AppState, types::ChildId},
        store::MemoryKeyValueStore,
    };

    struct FixedAdvisor {
        points: u32,
    }

    impl ConsequenceAdvisor for FixedAdvisor {
        fn provider_kind(&self) -> AdvisorProviderKind {
            AdvisorProviderKind::Gemini
        }

        fn suggest(
            &self,
            request_id: AdvisorRequestId,
            request: &ConsequenceRequest,
        ) -> Result<ConsequenceResponse, AdvisorError> {
            Ok(ConsequenceResponse::new(
                request_id,
                self.provider_kind(),
                ConsequenceSuggestion {
                    consequence: format!("{} helps clean up", request.child_name),
                    reasoning: "Related and reasonable".to_string(),
                    conversation_starter: "How did that feel?".to_string(),
                    points_deduction: self.points,
                },
            ))
        }
    }

    struct BrokenAdvisor;

    impl ConsequenceAdvisor for BrokenAdvisor {
        fn provider_kind(&self) -> AdvisorProviderKind {
            AdvisorProviderKind::OpenAi
        }

        fn suggest(
            &self,
            request_id: AdvisorRequestId,
            _request: &ConsequenceRequest,
        ) -> Result<ConsequenceResponse, AdvisorError> {
            Err(AdvisorError::new(
                request_id,
                self.provider_kind(),
                AdvisorErrorKind::malformed_response("missing pointsDeduction"),
            ))
        }
    }

    fn app(advisor: Arc<dyn ConsequenceAdvisor>, points: u64) -> (App, ChildId) {
        let (state, child_id) = add_child(&AppState::default(), "Maya", 8, &[]).unwrap();
        let mut store = LedgerStore::open(Box::new(MemoryKeyValueStore::new()));
        store.commit(state).unwrap();
        if points > 0 {
            let chore = crate::ledger::types::Chore::new("c", "Chore", points as u32, true).unwrap();
            let next = crate::ledger::engine::apply_chore_completion(
                store.state(),
                &child_id,
                &chore,
                RecordStamp::now(),
            )
            .unwrap()
            .unwrap();
            store.commit(next).unwrap();
        }

        let mut app = App::new();
        app.add_message::<ConsequenceRequested>()
            .add_message::<ConsequenceDecision>()
            .add_message::<ConsequenceSuggestedEvent>()
            .add_message::<ConsequenceFailedEvent>()
            .add_message::<ConsequenceSettledEvent>()
            .add_message::<LedgerAppliedEvent>()
            .add_message::<LedgerRejectedEvent>()
            .insert_resource(store)
            .insert_resource(ActiveConsequenceAdvisor::new(advisor))
            .init_resource::<PendingConsequence>()
            .init_resource::<AdvisorTasks>()
            .add_systems(
                Update,
                (
                    start_consequence_requests,
                    poll_consequence_tasks,
                    apply_consequence_decisions,
                    cancel_consequence_on_selection,
                )
                    .chain(),
            );
        (app, child_id)
    }

    fn settle(app: &mut App) {
        for _ in 0..200 {
            app.update();
            if app.world().resource::<AdvisorTasks>().is_empty() {
                return;
            }
            thread::sleep(Duration::from_millis(5));
        }
        panic!("advisor task never completed");
    }

    fn child_points(app: &App, child_id: &ChildId) -> (u64, usize) {
        let child = app
            .world()
            .resource::<LedgerStore>()
            .state()
            .child(child_id)
            .cloned()
            .unwrap();
        (child.points(), child.history().len())
    }

    #[test]
    fn confirmed_suggestion_clamps_and_records_requested_deduction() {
        let (mut app, child_id) = app(Arc::new(FixedAdvisor { points: 15 }), 10);
        app.world_mut().write_message(ConsequenceRequested {
            child_id: child_id.clone(),
            behavior: "Threw a toy".to_string(),
        });
        settle(&mut app);
        assert!(matches!(
            app.world().resource::<PendingConsequence>().stage(),
            PendingStage::Ready { .. }
        ));
        assert_eq!(child_points(&app, &child_id), (10, 1));

        app.world_mut().write_message(ConsequenceDecision::Confirm);
        app.update();

        let store = app.world().resource::<LedgerStore>();
        let child = store.state().child(&child_id).unwrap();
        assert_eq!(child.points(), 0);
        assert_eq!(child.history()[0].points_change(), -15);
        assert_eq!(child.history()[0].outcome(), "Maya helps clean up");
    }

    #[test]
    fn discarded_suggestion_leaves_ledger_alone() {
        let (mut app, child_id) = app(Arc::new(FallbackConsequenceAdvisor), 30);
        app.world_mut().write_message(ConsequenceRequested {
            child_id: child_id.clone(),
            behavior: "Skipped homework".to_string(),
        });
        settle(&mut app);

        let before = app.world().resource::<LedgerStore>().state().clone();
        app.world_mut().write_message(ConsequenceDecision::Discard);
        app.update();

        assert_eq!(child_points(&app, &child_id), (30, 1));
        assert_eq!(app.world().resource::<LedgerStore>().state(), &before);
        assert!(matches!(
            app.world().resource::<PendingConsequence>().stage(),
            PendingStage::Idle
        ));
    }

    #[test]
    fn advisor_failure_keeps_draft_and_state() {
        let (mut app, child_id) = app(Arc::new(BrokenAdvisor), 0);
        app.world_mut().write_message(ConsequenceRequested {
            child_id: child_id.clone(),
            behavior: "Slammed the door".to_string(),
        });
        settle(&mut app);

        let pending = app.world().resource::<PendingConsequence>();
        assert!(matches!(pending.stage(), PendingStage::Failed { .. }));
        assert_eq!(
            pending.draft().map(|draft| draft.behavior.as_str()),
            Some("Slammed the door")
        );
        assert_eq!(child_points(&app, &child_id), (0, 0));

        app.world_mut().write_message(ConsequenceDecision::Confirm);
        app.update();
        assert_eq!(child_points(&app, &child_id), (0, 0));
    }
}
