//! Applies queued ledger commands against the store, one commit per command.
use bevy::prelude::*;

use crate::store::LedgerStore;

use super::{
    catalog::Catalog,
    engine::{add_child, apply_chore_completion, apply_reward_redemption, select_child},
    errors::LedgerError,
    events::{LedgerAppliedEvent, LedgerChange, LedgerCommand, LedgerRejectedEvent},
    state::AppState,
    types::{ChildId, RecordStamp},
};

type Transition = Result<(AppState, ChildId, LedgerChange), LedgerError>;

pub fn apply_ledger_commands(
    mut commands: MessageReader<LedgerCommand>,
    catalog: Res<Catalog>,
    mut store: ResMut<LedgerStore>,
    mut applied: MessageWriter<LedgerAppliedEvent>,
    mut rejected: MessageWriter<LedgerRejectedEvent>,
) {
    for command in commands.read() {
        let outcome = plan_transition(store.state(), &catalog, command).and_then(
            |(next, child_id, change)| {
                commit_transition(&mut store, next)?;
                Ok(LedgerAppliedEvent { child_id, change })
            },
        );

        match outcome {
            Ok(event) => {
                applied.write(event);
            }
            Err(error) => {
                info!("Ledger command rejected: {}", error);
                rejected.write(LedgerRejectedEvent { error });
            }
        }
    }
}

/// Saves and swaps in a computed state; nothing changes when the write fails.
pub(crate) fn commit_transition(store: &mut LedgerStore, next: AppState) -> Result<(), LedgerError> {
    store.commit(next).map_err(|err| {
        warn!("Ledger change dropped because it could not be saved: {}", err);
        LedgerError::not_saved(err.to_string())
    })
}

fn plan_transition(state: &AppState, catalog: &Catalog, command: &LedgerCommand) -> Transition {
    match command {
        LedgerCommand::AddChild { name, age } => {
            let (next, child_id) = add_child(state, name, *age, catalog.avatars())?;
            Ok((next, child_id, LedgerChange::ChildAdded))
        }
        LedgerCommand::SelectChild { child_id } => select_child(state, child_id)
            .map(|next| (next, child_id.clone(), LedgerChange::Selected))
            .ok_or_else(|| unknown_child(child_id)),
        LedgerCommand::CompleteChore { child_id, chore_id } => {
            let chore = catalog.chore(chore_id).ok_or_else(|| {
                LedgerError::invalid_input("chore", format!("unknown chore '{}'", chore_id))
            })?;
            let next = apply_chore_completion(state, child_id, chore, RecordStamp::now())?;
            recorded(next, child_id)
        }
        LedgerCommand::RedeemReward {
            child_id,
            reward_id,
        } => {
            let reward = catalog.reward(reward_id).ok_or_else(|| {
                LedgerError::invalid_input("reward", format!("unknown reward '{}'", reward_id))
            })?;
            let next = apply_reward_redemption(state, child_id, reward, RecordStamp::now())?;
            recorded(next, child_id)
        }
    }
}

/// Wraps an engine result, reporting the freshly prepended record.
pub(crate) fn recorded(next: Option<AppState>, child_id: &ChildId) -> Transition {
    let next = next.ok_or_else(|| unknown_child(child_id))?;
    let record = next
        .child(child_id)
        .and_then(|child| child.history().first())
        .cloned()
        .ok_or_else(|| unknown_child(child_id))?;
    Ok((next, child_id.clone(), LedgerChange::Recorded(record)))
}

pub(crate) fn unknown_child(child_id: &ChildId) -> LedgerError {
    LedgerError::invalid_input("child", format!("no child with id '{}'", child_id))
}
