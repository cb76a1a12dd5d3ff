//! The staged consequence: draft behavior text plus the advisor round-trip.
//!
//! Nothing in here touches the ledger until [`PendingConsequence::confirm`].
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use bevy::prelude::*;

use crate::ledger::{
    engine::apply_consequence,
    errors::LedgerError,
    state::AppState,
    types::{ChildId, RecordStamp},
};

use super::{
    errors::AdvisorError,
    types::{AdvisorRequestId, ConsequenceResponse, ConsequenceSuggestion},
};

/// Shared flag telling an in-flight advisor call its result is no longer wanted.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// The behavior a parent typed, and for which child.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsequenceDraft {
    pub child_id: ChildId,
    pub behavior: String,
}

impl ConsequenceDraft {
    pub fn new(child_id: ChildId, behavior: impl Into<String>) -> Self {
        Self {
            child_id,
            behavior: behavior.into(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub enum PendingStage {
    #[default]
    Idle,
    Requesting {
        request_id: AdvisorRequestId,
        token: CancellationToken,
    },
    Ready {
        suggestion: ConsequenceSuggestion,
    },
    Failed {
        error: AdvisorError,
    },
}

impl PendingStage {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Requesting { .. } => "requesting",
            Self::Ready { .. } => "ready",
            Self::Failed { .. } => "failed",
        }
    }
}

/// What happened to an advisor result handed to [`PendingConsequence::resolve`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveOutcome {
    Accepted,
    Stale,
}

#[derive(Resource, Debug, Default)]
pub struct PendingConsequence {
    draft: Option<ConsequenceDraft>,
    stage: PendingStage,
    next_id: u64,
}

impl PendingConsequence {
    pub fn draft(&self) -> Option<&ConsequenceDraft> {
        self.draft.as_ref()
    }

    #[cfg(test)]
    pub fn stage(&self) -> &PendingStage {
        &self.stage
    }

    #[cfg(test)]
    pub fn suggestion(&self) -> Option<&ConsequenceSuggestion> {
        match &self.stage {
            PendingStage::Ready { suggestion } => Some(suggestion),
            _ => None,
        }
    }

    /// Starts a new request, superseding and cancelling any outstanding one.
    pub fn begin(
        &mut self,
        draft: ConsequenceDraft,
    ) -> Result<(AdvisorRequestId, CancellationToken), LedgerError> {
        if draft.behavior.trim().is_empty() {
            return Err(LedgerError::invalid_input(
                "behavior",
                "behavior description cannot be empty",
            ));
        }

        self.cancel_in_flight();
        self.next_id += 1;
        let request_id = AdvisorRequestId::new(self.next_id);
        let token = CancellationToken::new();

        self.draft = Some(draft);
        self.stage = PendingStage::Requesting {
            request_id,
            token: token.clone(),
        };
        Ok((request_id, token))
    }

    /// Lands an advisor result; anything but the current, live request is stale.
    pub fn resolve(
        &mut self,
        request_id: AdvisorRequestId,
        result: Result<ConsequenceResponse, AdvisorError>,
    ) -> ResolveOutcome {
        let current = match &self.stage {
            PendingStage::Requesting {
                request_id: current,
                token,
            } if !token.is_cancelled() => *current,
            _ => return ResolveOutcome::Stale,
        };
        if current != request_id {
            return ResolveOutcome::Stale;
        }

        self.stage = match result {
            Ok(response) => PendingStage::Ready {
                suggestion: response.suggestion,
            },
            Err(error) => PendingStage::Failed { error },
        };
        ResolveOutcome::Accepted
    }

    /// Drops the request and draft when the active child changes to someone else.
    pub fn retarget(&mut self, selected: &ChildId) -> bool {
        let Some(previous) = self
            .draft
            .as_ref()
            .filter(|draft| &draft.child_id != selected)
            .map(|draft| draft.child_id.clone())
        else {
            return false;
        };

        debug!(
            "Dropping consequence draft for {} after switching to {}",
            previous, selected
        );
        self.cancel_in_flight();
        self.stage = PendingStage::Idle;
        self.draft = None;
        true
    }

    /// Returns to idle with no ledger effect. The draft text is kept for a retry.
    pub fn discard(&mut self) {
        self.cancel_in_flight();
        self.stage = PendingStage::Idle;
    }

    /// Computes the state with the ready suggestion applied, leaving the stage as is.
    ///
    /// Call [`PendingConsequence::clear`] once that state has been committed.
    pub fn confirm(
        &self,
        state: &AppState,
        stamp: RecordStamp,
    ) -> Result<Option<AppState>, LedgerError> {
        let (Some(draft), PendingStage::Ready { suggestion }) = (&self.draft, &self.stage) else {
            let reason = match &self.stage {
                PendingStage::Failed { error } => {
                    format!("no suggestion is ready to confirm (last request failed: {})", error.kind)
                }
                stage => format!("no suggestion is ready to confirm (stage: {})", stage.label()),
            };
            return Err(LedgerError::invalid_input("consequence", reason));
        };

        apply_consequence(state, &draft.child_id, &draft.behavior, suggestion, stamp)
    }

    /// Drops the draft and returns to idle after a confirmed consequence is saved.
    pub fn clear(&mut self) {
        self.cancel_in_flight();
        self.stage = PendingStage::Idle;
        self.draft = None;
    }

    fn cancel_in_flight(&mut self) {
        if let PendingStage::Requesting { request_id, token } = &self.stage {
            debug!("Cancelling advisor request {}", request_id);
            token.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::advisor::{broker::AdvisorProviderKind, errors::AdvisorErrorKind};
    use crate::ledger::engine::add_child;

    fn suggestion(points: u32) -> ConsequenceSuggestion {
        ConsequenceSuggestion {
            consequence: "Apologise and help tidy up".to_string(),
            reasoning: "Restores the relationship".to_string(),
            conversation_starter: "What could you do differently?".to_string(),
            points_deduction: points,
        }
    }

    fn response(id: AdvisorRequestId, points: u32) -> ConsequenceResponse {
        ConsequenceResponse::new(id, AdvisorProviderKind::Local, suggestion(points))
    }

    fn seeded() -> (AppState, ChildId) {
        add_child(&AppState::default(), "Maya", 8, &[]).unwrap()
    }

    #[test]
    fn blank_behavior_is_rejected_before_any_request() {
        let (_, child_id) = seeded();
        let mut pending = PendingConsequence::default();
        let result = pending.begin(ConsequenceDraft::new(child_id, "   "));
        assert!(matches!(result, Err(LedgerError::InvalidInput { .. })));
        assert!(matches!(pending.stage(), PendingStage::Idle));
    }

    #[test]
    fn new_request_supersedes_and_cancels_previous() {
        let (_, child_id) = seeded();
        let mut pending = PendingConsequence::default();
        let (first, first_token) = pending
            .begin(ConsequenceDraft::new(child_id.clone(), "Yelled"))
            .unwrap();
        let (second, _) = pending
            .begin(ConsequenceDraft::new(child_id, "Yelled at sister"))
            .unwrap();

        assert!(first_token.is_cancelled());
        assert_eq!(
            pending.resolve(first, Ok(response(first, 5))),
            ResolveOutcome::Stale
        );
        assert_eq!(
            pending.resolve(second, Ok(response(second, 5))),
            ResolveOutcome::Accepted
        );
        assert_eq!(pending.suggestion().map(|s| s.points_deduction), Some(5));
    }

    #[test]
    fn failure_keeps_draft_for_retry() {
        let (_, child_id) = seeded();
        let mut pending = PendingConsequence::default();
        let (id, _) = pending
            .begin(ConsequenceDraft::new(child_id, "Broke a vase"))
            .unwrap();
        let error = AdvisorError::new(
            id,
            AdvisorProviderKind::Gemini,
            AdvisorErrorKind::provider_failure("timeout"),
        );

        assert_eq!(pending.resolve(id, Err(error)), ResolveOutcome::Accepted);
        assert!(matches!(pending.stage(), PendingStage::Failed { .. }));
        assert_eq!(
            pending.draft().map(|draft| draft.behavior.as_str()),
            Some("Broke a vase")
        );

        let (state, _) = seeded();
        let refused = pending.confirm(&state, RecordStamp::now());
        assert!(matches!(
            refused,
            Err(LedgerError::InvalidInput { reason, .. }) if reason.contains("timeout")
        ));
    }

    #[test]
    fn discard_never_touches_ledger_and_is_idempotent() {
        let (state, child_id) = seeded();
        let before = state.clone();
        let mut pending = PendingConsequence::default();
        let (id, _) = pending
            .begin(ConsequenceDraft::new(child_id, "Hit brother"))
            .unwrap();
        pending.resolve(id, Ok(response(id, 20)));

        pending.discard();
        pending.discard();

        assert!(matches!(pending.stage(), PendingStage::Idle));
        assert!(pending.draft().is_some());
        assert!(matches!(
            pending.confirm(&state, RecordStamp::now()),
            Err(LedgerError::InvalidInput { .. })
        ));
        assert_eq!(state, before);
    }

    #[test]
    fn late_result_after_discard_is_ignored() {
        let (_, child_id) = seeded();
        let mut pending = PendingConsequence::default();
        let (id, token) = pending
            .begin(ConsequenceDraft::new(child_id, "Hit brother"))
            .unwrap();
        pending.discard();

        assert!(token.is_cancelled());
        assert_eq!(pending.resolve(id, Ok(response(id, 3))), ResolveOutcome::Stale);
        assert!(pending.suggestion().is_none());
    }

    #[test]
    fn confirm_applies_consequence_and_clear_resets() {
        let (state, child_id) = seeded();
        let mut pending = PendingConsequence::default();
        let (id, _) = pending
            .begin(ConsequenceDraft::new(child_id.clone(), "Talked back"))
            .unwrap();
        pending.resolve(id, Ok(response(id, 15)));

        let next = pending
            .confirm(&state, RecordStamp::now())
            .unwrap()
            .expect("child exists");
        let child = next.child(&child_id).unwrap();
        assert_eq!(child.points(), 0);
        assert_eq!(child.history()[0].points_change(), -15);
        assert_eq!(child.history()[0].description(), "Talked back");
        assert!(pending.suggestion().is_some());

        pending.clear();
        assert!(matches!(pending.stage(), PendingStage::Idle));
        assert!(pending.draft().is_none());
    }

    #[test]
    fn switching_child_cancels_pending_request() {
        let (state, maya) = seeded();
        let (_, leo) = add_child(&state, "Leo", 6, &[]).unwrap();
        let mut pending = PendingConsequence::default();
        let (id, token) = pending
            .begin(ConsequenceDraft::new(maya.clone(), "Hid the remote"))
            .unwrap();

        assert!(!pending.retarget(&maya));
        assert!(pending.retarget(&leo));
        assert!(token.is_cancelled());
        assert!(pending.draft().is_none());
        assert_eq!(pending.resolve(id, Ok(response(id, 1))), ResolveOutcome::Stale);
    }
}
