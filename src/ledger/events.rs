//! Messages flowing into and out of the ledger.
use bevy::prelude::Message;

use super::{
    errors::LedgerError,
    types::{ActivityRecord, ChildId},
};

/// A user action that may change the ledger.
#[derive(Message, Debug, Clone, PartialEq, Eq)]
pub enum LedgerCommand {
    AddChild { name: String, age: u32 },
    SelectChild { child_id: ChildId },
    CompleteChore { child_id: ChildId, chore_id: String },
    RedeemReward { child_id: ChildId, reward_id: String },
}

/// What a committed transition changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerChange {
    ChildAdded,
    Selected,
    Recorded(ActivityRecord),
}

/// Fired after a new state has been committed to the store.
#[derive(Message, Debug, Clone)]
pub struct LedgerAppliedEvent {
    pub child_id: ChildId,
    pub change: LedgerChange,
}

/// Fired when an action was refused or could not be saved; the state is unchanged.
#[derive(Message, Debug, Clone)]
pub struct LedgerRejectedEvent {
    pub error: LedgerError,
}
