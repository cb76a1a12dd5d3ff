//! Pure ledger transitions.
//!
//! Every operation borrows the current [`AppState`] and returns a brand new
//! state, so a child's balance and history are always swapped in together.
//! `Ok(None)` means the target child does not exist and nothing happened.
use bevy::log::debug;

use crate::advisor::types::ConsequenceSuggestion;

use super::{
    errors::LedgerError,
    state::AppState,
    types::{ActivityKind, ActivityRecord, ChildId, ChildProfile, Chore, RecordStamp, Reward},
};

/// Applies a signed delta to a balance, flooring the result at zero.
pub fn clamp_balance(balance: u64, delta: i64) -> u64 {
    let next = i128::from(balance) + i128::from(delta);
    u64::try_from(next.max(0)).unwrap_or(u64::MAX)
}

/// Adds a child with a zero balance, picking the avatar round-robin.
pub fn add_child(
    state: &AppState,
    name: &str,
    age: u32,
    avatars: &[String],
) -> Result<(AppState, ChildId), LedgerError> {
    let avatar = if avatars.is_empty() {
        String::new()
    } else {
        avatars[state.len() % avatars.len()].clone()
    };

    let child = ChildProfile::new(ChildId::generate(), name, age, avatar)?;
    let child_id = child.id().clone();
    Ok((state.with_child_added(child), child_id))
}

/// Changes the active selection; unknown ids leave the state alone.
pub fn select_child(state: &AppState, child_id: &ChildId) -> Option<AppState> {
    if state.child(child_id).is_none() {
        debug!("Ignoring selection of unknown child {}", child_id);
        return None;
    }
    Some(state.with_selection(Some(child_id.clone())))
}

/// Credits a completed chore to the child.
///
/// Returns `Ok(None)` when the child is unknown.
pub fn apply_chore_completion(
    state: &AppState,
    child_id: &ChildId,
    chore: &Chore,
    stamp: RecordStamp,
) -> Result<Option<AppState>, LedgerError> {
    transition(state, child_id, |child| {
        let delta = i64::from(chore.points());
        let record = ActivityRecord::new(
            ActivityKind::Chore,
            format!("Completed: {}", chore.title()),
            format!("Earned {} points!", chore.points()),
            delta,
            stamp,
        );
        Ok((record, clamp_balance(child.points(), delta)))
    })
}

/// Spends the reward's cost from the child's balance.
///
/// Fails with [`LedgerError::InsufficientBalance`] when the child cannot
/// afford it; the balance never goes below zero through a redemption.
pub fn apply_reward_redemption(
    state: &AppState,
    child_id: &ChildId,
    reward: &Reward,
    stamp: RecordStamp,
) -> Result<Option<AppState>, LedgerError> {
    transition(state, child_id, |child| {
        let cost = u64::from(reward.cost());
        if child.points() < cost {
            return Err(LedgerError::insufficient_balance(
                child.id().clone(),
                child.points(),
                reward.cost(),
            ));
        }

        let record = ActivityRecord::new(
            ActivityKind::RewardRedemption,
            format!("Redeemed: {}", reward.title()),
            format!("Spent {} points", reward.cost()),
            -i64::from(reward.cost()),
            stamp,
        );
        Ok((record, child.points() - cost))
    })
}

/// Records a confirmed behavior consequence.
///
/// The stored `pointsChange` is the requested deduction even when the floor
/// clamp absorbs part of it, so history can show more than the balance moved.
pub fn apply_consequence(
    state: &AppState,
    child_id: &ChildId,
    behavior: &str,
    suggestion: &ConsequenceSuggestion,
    stamp: RecordStamp,
) -> Result<Option<AppState>, LedgerError> {
    let behavior = behavior.trim();
    if behavior.is_empty() {
        return Err(LedgerError::invalid_input(
            "behavior",
            "behavior description cannot be empty",
        ));
    }

    transition(state, child_id, |child| {
        let delta = -i64::from(suggestion.points_deduction);
        let record = ActivityRecord::new(
            ActivityKind::Behavior,
            behavior,
            suggestion.consequence.clone(),
            delta,
            stamp,
        );
        Ok((record, clamp_balance(child.points(), delta)))
    })
}

fn transition<F>(
    state: &AppState,
    child_id: &ChildId,
    build: F,
) -> Result<Option<AppState>, LedgerError>
where
    F: FnOnce(&ChildProfile) -> Result<(ActivityRecord, u64), LedgerError>,
{
    let Some(child) = state.child(child_id) else {
        debug!("Ledger transition skipped: unknown child {}", child_id);
        return Ok(None);
    };

    let (record, points) = build(child)?;
    Ok(Some(state.with_child_replaced(child.with_record(record, points))))
}
