//! Plain-text rendering of ledger and advisor output.
use std::fmt::Write;

use chrono::Local;

use crate::{
    advisor::types::ConsequenceResponse,
    ledger::{
        catalog::Catalog,
        chart::BalancePoint,
        state::AppState,
        types::{ActivityRecord, ChildProfile},
    },
};

const BAR_SCALE: i64 = 10;

pub fn children(state: &AppState) -> String {
    if state.is_empty() {
        return "No children yet. Add one with `fairguard add-child <name> <age>`.".to_string();
    }

    let selected = state.selected_child_id();
    let mut out = String::new();
    for child in state.children() {
        let marker = if Some(child.id()) == selected { '*' } else { ' ' };
        let _ = writeln!(
            out,
            "{} {:<16} age {:>2}  {:>6} pts  {:<10} {}",
            marker,
            child.name(),
            child.age(),
            child.points(),
            child.avatar_ref(),
            child.id()
        );
    }
    out
}

pub fn chores(catalog: &Catalog) -> String {
    let mut out = String::new();
    for chore in catalog.chores() {
        let cadence = if chore.is_recurring() { "daily" } else { "once" };
        let _ = writeln!(
            out,
            "{:<4} {:<24} +{:<4} {}",
            chore.id(),
            chore.title(),
            chore.points(),
            cadence
        );
    }
    out
}

/// Marks each reward as ready or locked when a child is given.
pub fn rewards(catalog: &Catalog, child: Option<&ChildProfile>) -> String {
    let mut out = match child {
        Some(child) => format!("{} has {} points\n", child.name(), child.points()),
        None => String::new(),
    };
    for reward in catalog.rewards() {
        let availability = match child {
            Some(child) => {
                let cost = u64::from(reward.cost());
                if child.points() >= cost {
                    "ready".to_string()
                } else {
                    format!("locked (needs {} more)", cost - child.points())
                }
            }
            None => String::new(),
        };
        let _ = writeln!(
            out,
            "{:<4} {:<24} {:>4} pts  {}",
            reward.id(),
            reward.title(),
            reward.cost(),
            availability
        );
    }
    out
}

pub fn record(record: &ActivityRecord) -> String {
    format!(
        "{}  {:<17} {:>+5}  {} - {}",
        record
            .timestamp()
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M"),
        record.kind().label(),
        record.points_change(),
        record.description(),
        record.outcome()
    )
}

pub fn history(child: &ChildProfile) -> String {
    if child.history().is_empty() {
        return format!("{} has no activity yet.", child.name());
    }

    let mut out = format!("{} - {} points\n", child.name(), child.points());
    for entry in child.history() {
        let _ = writeln!(out, "{}", record(entry));
    }
    out
}

/// One row per point with a bar scaled to the window's largest magnitude.
pub fn chart(child: &ChildProfile, points: &[BalancePoint]) -> String {
    if points.is_empty() {
        return format!("{} has no point changes to chart.", child.name());
    }

    let peak = points
        .iter()
        .map(|point| point.value.unsigned_abs())
        .max()
        .unwrap_or(0)
        .max(1);
    let mut out = format!("{} - running balance\n", child.name());
    for point in points {
        let width = (point.value.unsigned_abs() * BAR_SCALE as u64).div_ceil(peak) as usize;
        let bar = if point.value < 0 { '-' } else { '#' };
        let _ = writeln!(
            out,
            "{}  {:>6}  {}",
            point.label,
            point.value,
            bar.to_string().repeat(width)
        );
    }
    out
}

pub fn suggestion(response: &ConsequenceResponse) -> String {
    let suggestion = &response.suggestion;
    format!(
        "Suggested consequence ({})\n  Consequence:  {}\n  Why:          {}\n  Talk about:   {}\n  Deduction:    {} points",
        response.provider,
        suggestion.consequence,
        suggestion.reasoning,
        suggestion.conversation_starter,
        suggestion.points_deduction
    )
}
