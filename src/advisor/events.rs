//! Messages for the consequence round-trip.
use bevy::prelude::Message;

use crate::ledger::types::ChildId;

use super::{errors::AdvisorError, types::ConsequenceResponse};

/// Asks the advisor for a consequence for `behavior`.
#[derive(Message, Debug, Clone)]
pub struct ConsequenceRequested {
    pub child_id: ChildId,
    pub behavior: String,
}

/// The parent's answer to a ready suggestion.
#[derive(Message, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsequenceDecision {
    Confirm,
    Discard,
}

#[derive(Message, Debug, Clone)]
pub struct ConsequenceSuggestedEvent {
    pub response: ConsequenceResponse,
}

/// Fired when the current request fails. The draft survives for a retry.
#[derive(Message, Debug, Clone)]
pub struct ConsequenceFailedEvent {
    pub error: AdvisorError,
}

/// Fired when a decision was made on a ready suggestion.
#[derive(Message, Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsequenceSettledEvent {
    pub decision: ConsequenceDecision,
}
