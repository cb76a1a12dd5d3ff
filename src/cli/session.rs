//! One CLI invocation: issue the action, wait for it to settle, report, exit.
use std::io::{self, BufRead, Write};

use bevy::prelude::*;

use crate::{
    advisor::events::{
        ConsequenceDecision, ConsequenceFailedEvent, ConsequenceRequested,
        ConsequenceSettledEvent, ConsequenceSuggestedEvent,
    },
    core::FairguardSettings,
    ledger::{
        catalog::Catalog,
        chart::running_balance_series,
        events::{LedgerAppliedEvent, LedgerChange, LedgerCommand, LedgerRejectedEvent},
        state::AppState,
        types::ChildProfile,
    },
    store::LedgerStore,
};

use super::{args::CliCommand, render};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Pending,
    AwaitingLedger,
    /// `None` means the parent is asked once the suggestion arrives.
    AwaitingSuggestion { decision: Option<ConsequenceDecision> },
    AwaitingDiscard,
    Finished { success: bool },
}

/// The command being run plus everything printed so far.
#[derive(Resource, Debug)]
pub struct CliSession {
    command: CliCommand,
    phase: SessionPhase,
    transcript: Vec<String>,
}

impl CliSession {
    pub fn new(command: CliCommand) -> Self {
        Self {
            command,
            phase: SessionPhase::Pending,
            transcript: Vec::new(),
        }
    }

    #[cfg(test)]
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    #[cfg(test)]
    pub fn transcript(&self) -> &[String] {
        &self.transcript
    }

    fn say(&mut self, text: impl Into<String>) {
        let text = text.into();
        println!("{}", text.trim_end());
        self.transcript.push(text);
    }

    fn fail(&mut self, text: impl Into<String>) {
        let text = text.into();
        eprintln!("{}", text);
        self.transcript.push(text);
        self.phase = SessionPhase::Finished { success: false };
    }

    fn finish(&mut self, text: impl Into<String>) {
        self.say(text);
        self.phase = SessionPhase::Finished { success: true };
    }
}

/// Asks the parent a yes/no question.
pub trait DecisionPrompt: Send + Sync {
    fn confirm(&mut self, question: &str) -> bool;
}

/// Reads the answer from stdin; anything but `y`/`yes` is a no.
pub struct StdinPrompt;

impl DecisionPrompt for StdinPrompt {
    fn confirm(&mut self, question: &str) -> bool {
        print!("{} ", question);
        if let Err(err) = io::stdout().flush() {
            warn!("Could not show the prompt: {}", err);
        }

        let mut answer = String::new();
        match io::stdin().lock().read_line(&mut answer) {
            Ok(_) => matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"),
            Err(err) => {
                warn!("Could not read an answer, treating it as no: {}", err);
                false
            }
        }
    }
}

#[derive(Resource)]
pub struct CliPrompt(Box<dyn DecisionPrompt>);

impl CliPrompt {
    pub fn new(prompt: impl DecisionPrompt + 'static) -> Self {
        Self(Box::new(prompt))
    }
}

/// Picks the child named by `query`, or the selected child when absent.
pub fn resolve_child<'a>(
    state: &'a AppState,
    query: Option<&str>,
) -> Result<&'a ChildProfile, String> {
    match query {
        Some(query) => state
            .find_child(query)
            .ok_or_else(|| format!("No child matches '{}'.", query.trim())),
        None => state
            .selected_child()
            .ok_or_else(|| "No child is selected. Pass --child or run `fairguard select`.".to_string()),
    }
}

pub fn issue_cli_command(
    mut session: ResMut<CliSession>,
    store: Res<LedgerStore>,
    catalog: Res<Catalog>,
    settings: Res<FairguardSettings>,
    mut ledger: MessageWriter<LedgerCommand>,
    mut advisor: MessageWriter<ConsequenceRequested>,
) {
    if session.phase != SessionPhase::Pending {
        return;
    }

    let state = store.state();
    let command = session.command.clone();

    let child = match command {
        CliCommand::AddChild { .. } | CliCommand::List | CliCommand::Chores | CliCommand::Rewards => {
            None
        }
        _ => match resolve_child(state, command.child_query()) {
            Ok(child) => Some(child),
            Err(message) => {
                session.fail(message);
                return;
            }
        },
    };

    match (command, child) {
        (CliCommand::AddChild { name, age }, _) => {
            ledger.write(LedgerCommand::AddChild { name, age });
            session.phase = SessionPhase::AwaitingLedger;
        }
        (CliCommand::List, _) => session.finish(render::children(state)),
        (CliCommand::Chores, _) => session.finish(render::chores(&catalog)),
        (CliCommand::Rewards, _) => {
            session.finish(render::rewards(&catalog, state.selected_child()))
        }
        (CliCommand::Select { .. }, Some(child)) => {
            ledger.write(LedgerCommand::SelectChild {
                child_id: child.id().clone(),
            });
            session.phase = SessionPhase::AwaitingLedger;
        }
        (CliCommand::Chore { chore_id, .. }, Some(child)) => {
            ledger.write(LedgerCommand::CompleteChore {
                child_id: child.id().clone(),
                chore_id,
            });
            session.phase = SessionPhase::AwaitingLedger;
        }
        (CliCommand::Redeem { reward_id, .. }, Some(child)) => {
            ledger.write(LedgerCommand::RedeemReward {
                child_id: child.id().clone(),
                reward_id,
            });
            session.phase = SessionPhase::AwaitingLedger;
        }
        (
            CliCommand::Behavior {
                text,
                confirm,
                discard,
                ..
            },
            Some(child),
        ) => {
            let decision = if confirm {
                Some(ConsequenceDecision::Confirm)
            } else if discard {
                Some(ConsequenceDecision::Discard)
            } else {
                None
            };
            session.say(format!("Asking the advisor about {}...", child.name()));
            advisor.write(ConsequenceRequested {
                child_id: child.id().clone(),
                behavior: text,
            });
            session.phase = SessionPhase::AwaitingSuggestion { decision };
        }
        (CliCommand::History { .. }, Some(child)) => session.finish(render::history(child)),
        (CliCommand::Chart { .. }, Some(child)) => {
            let points: Vec<_> =
                running_balance_series(child.history(), settings.chart_window).collect();
            session.finish(render::chart(child, &points));
        }
        (_, None) => session.fail("This command needs a child."),
    }
}

#[allow(clippy::too_many_arguments)]
pub fn report_cli_outcome(
    mut session: ResMut<CliSession>,
    mut prompt: ResMut<CliPrompt>,
    store: Res<LedgerStore>,
    mut applied: MessageReader<LedgerAppliedEvent>,
    mut rejected: MessageReader<LedgerRejectedEvent>,
    mut suggested: MessageReader<ConsequenceSuggestedEvent>,
    mut failed: MessageReader<ConsequenceFailedEvent>,
    mut settled: MessageReader<ConsequenceSettledEvent>,
    mut decisions: MessageWriter<ConsequenceDecision>,
) {
    for event in rejected.read() {
        if matches!(session.phase, SessionPhase::Finished { .. }) {
            break;
        }
        session.fail(format!("Rejected: {}", event.error));
    }

    for event in failed.read() {
        if let SessionPhase::AwaitingSuggestion { .. } = session.phase {
            let retry_hint = if event.error.kind.is_retryable() {
                " Try again in a moment; nothing was recorded."
            } else {
                ""
            };
            session.fail(format!("{}.{}", event.error, retry_hint));
        }
    }

    for event in suggested.read() {
        let SessionPhase::AwaitingSuggestion { decision } = session.phase else {
            continue;
        };
        session.say(render::suggestion(&event.response));
        let decision = decision.unwrap_or_else(|| {
            if prompt.0.confirm("Apply this consequence? [y/N]") {
                ConsequenceDecision::Confirm
            } else {
                ConsequenceDecision::Discard
            }
        });
        if decision == ConsequenceDecision::Confirm {
            decisions.write(ConsequenceDecision::Confirm);
            session.phase = SessionPhase::AwaitingLedger;
        } else {
            decisions.write(ConsequenceDecision::Discard);
            session.phase = SessionPhase::AwaitingDiscard;
        }
    }

    for event in settled.read() {
        if session.phase == SessionPhase::AwaitingDiscard
            && event.decision == ConsequenceDecision::Discard
        {
            session.finish("Not applied; the ledger is unchanged.");
        }
    }

    for event in applied.read() {
        if session.phase != SessionPhase::AwaitingLedger {
            continue;
        }
        let Some(child) = store.state().child(&event.child_id) else {
            continue;
        };
        let message = match &event.change {
            LedgerChange::ChildAdded => format!(
                "Added {} (age {}) as {}.",
                child.name(),
                child.age(),
                child.id()
            ),
            LedgerChange::Selected => format!("{} is now selected.", child.name()),
            LedgerChange::Recorded(record) => format!(
                "{}\n{} now has {} points.",
                render::record(record),
                child.name(),
                child.points()
            ),
        };
        session.finish(message);
    }
}

pub fn exit_when_finished(session: Res<CliSession>, mut exit: MessageWriter<AppExit>) {
    if let SessionPhase::Finished { success } = session.phase {
        exit.write(if success {
            AppExit::Success
        } else {
            AppExit::error()
        });
    }
}
