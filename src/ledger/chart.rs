//! Running-balance series derived from a child's history for charting.
use std::{iter::FusedIterator, vec};

use chrono::{DateTime, Local, Utc};

use super::types::ActivityRecord;

pub const DEFAULT_CHART_WINDOW: usize = 10;

/// One charted point: when it happened and the running value at that step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalancePoint {
    pub label: String,
    pub timestamp: DateTime<Utc>,
    pub value: i64,
}

/// Lazy fold over the selected window, oldest entry first.
///
/// The running value starts at zero rather than at the balance before the
/// window, so the series shows drift within the window.
#[derive(Debug)]
pub struct BalanceSeries {
    entries: vec::IntoIter<(DateTime<Utc>, i64)>,
    running: i64,
}

impl Iterator for BalanceSeries {
    type Item = BalancePoint;

    fn next(&mut self) -> Option<Self::Item> {
        let (timestamp, change) = self.entries.next()?;
        self.running = self.running.saturating_add(change);
        Some(BalancePoint {
            label: time_label(timestamp),
            timestamp,
            value: self.running,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.entries.size_hint()
    }
}

impl ExactSizeIterator for BalanceSeries {}

impl FusedIterator for BalanceSeries {}

/// Builds the series for the `window` most recent entries that moved points.
pub fn running_balance_series(history: &[ActivityRecord], window: usize) -> BalanceSeries {
    let mut selected: Vec<_> = history
        .iter()
        .filter(|record| !record.is_zero_effect_behavior())
        .take(window)
        .map(|record| (record.timestamp(), record.points_change()))
        .collect();
    selected.reverse();

    BalanceSeries {
        entries: selected.into_iter(),
        running: 0,
    }
}

/// Local wall-clock `HH:MM`.
pub fn time_label(timestamp: DateTime<Utc>) -> String {
    timestamp.with_timezone(&Local).format("%H:%M").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::types::{ActivityKind, RecordStamp};

    fn at(seconds: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000 + seconds, 0).unwrap()
    }

    fn record(kind: ActivityKind, change: i64, seconds: i64) -> ActivityRecord {
        ActivityRecord::new(kind, "entry", "outcome", change, RecordStamp::at(at(seconds)))
    }

    #[test]
    fn drops_zero_effect_behavior_and_folds_oldest_first() {
        let history = vec![
            record(ActivityKind::Chore, 20, 4),
            record(ActivityKind::Behavior, 0, 3),
            record(ActivityKind::RewardRedemption, -5, 2),
            record(ActivityKind::Chore, 10, 1),
        ];

        let series: Vec<_> = running_balance_series(&history, DEFAULT_CHART_WINDOW).collect();
        let timestamps: Vec<_> = series.iter().map(|point| point.timestamp).collect();
        let values: Vec<_> = series.iter().map(|point| point.value).collect();

        assert_eq!(timestamps, vec![at(1), at(2), at(4)]);
        assert_eq!(values, vec![10, 5, 25]);
        assert_eq!(series[0].label, time_label(at(1)));
    }

    #[test]
    fn zero_change_chores_are_kept() {
        let history = vec![
            record(ActivityKind::Chore, 0, 2),
            record(ActivityKind::Behavior, -10, 1),
        ];

        let values: Vec<_> = running_balance_series(&history, DEFAULT_CHART_WINDOW)
            .map(|point| point.value)
            .collect();
        assert_eq!(values, vec![-10, -10]);
    }

    #[test]
    fn window_keeps_most_recent_entries_and_restarts_from_zero() {
        let history: Vec<_> = (0..15)
            .rev()
            .map(|index| record(ActivityKind::Chore, 1, index))
            .collect();

        let series = running_balance_series(&history, DEFAULT_CHART_WINDOW);
        assert_eq!(series.len(), 10);

        let points: Vec<_> = series.collect();
        assert_eq!(points.first().map(|point| point.timestamp), Some(at(5)));
        assert_eq!(points.last().map(|point| point.timestamp), Some(at(14)));
        assert_eq!(points.last().map(|point| point.value), Some(10));
    }

    #[test]
    fn empty_history_yields_nothing() {
        let mut series = running_balance_series(&[], DEFAULT_CHART_WINDOW);
        assert_eq!(series.next(), None);
        assert_eq!(series.next(), None);
    }
}
