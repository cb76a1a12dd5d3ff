//! Ledger data types: activity records, child profiles, chores and rewards.
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::LedgerError;

/// Youngest and oldest ages accepted when adding a child.
pub const MIN_CHILD_AGE: u32 = 1;
pub const MAX_CHILD_AGE: u32 = 25;

/// Opaque identifier for a child profile.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChildId(String);

impl ChildId {
    #[cfg(test)]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChildId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque identifier for a single activity record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    #[cfg(test)]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What kind of action produced an activity record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    Chore,
    Behavior,
    RewardRedemption,
}

impl ActivityKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Chore => "chore",
            Self::Behavior => "behavior",
            Self::RewardRedemption => "reward",
        }
    }
}

impl fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Identity and creation instant handed to every new record.
///
/// Production code uses [`RecordStamp::now`]; tests pin the instant so that
/// ordering and chart labels are deterministic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordStamp {
    pub id: RecordId,
    pub timestamp: DateTime<Utc>,
}

impl RecordStamp {
    pub fn now() -> Self {
        Self::at(Utc::now())
    }

    pub fn at(timestamp: DateTime<Utc>) -> Self {
        Self {
            id: RecordId::generate(),
            timestamp,
        }
    }
}

/// One immutable ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityRecord {
    id: RecordId,
    #[serde(rename = "type")]
    kind: ActivityKind,
    description: String,
    outcome: String,
    #[serde(deserialize_with = "whole_points::signed")]
    points_change: i64,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    timestamp: DateTime<Utc>,
}

impl ActivityRecord {
    pub fn new(
        kind: ActivityKind,
        description: impl Into<String>,
        outcome: impl Into<String>,
        points_change: i64,
        stamp: RecordStamp,
    ) -> Self {
        Self {
            id: stamp.id,
            kind,
            description: description.into(),
            outcome: outcome.into(),
            points_change,
            timestamp: stamp.timestamp,
        }
    }

    #[cfg(test)]
    pub fn id(&self) -> &RecordId {
        &self.id
    }

    pub fn kind(&self) -> ActivityKind {
        self.kind
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn outcome(&self) -> &str {
        &self.outcome
    }

    pub fn points_change(&self) -> i64 {
        self.points_change
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Advisor suggestions that did not move the balance.
    pub fn is_zero_effect_behavior(&self) -> bool {
        self.kind == ActivityKind::Behavior && self.points_change == 0
    }
}

/// A child's profile: identity, cached balance, and newest-first history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChildProfile {
    id: ChildId,
    name: String,
    age: u32,
    #[serde(deserialize_with = "whole_points::unsigned")]
    points: u64,
    #[serde(rename = "avatar")]
    avatar_ref: String,
    #[serde(default)]
    history: Vec<ActivityRecord>,
}

impl ChildProfile {
    /// Creates a fresh profile with a zero balance and empty history.
    pub fn new(
        id: ChildId,
        name: &str,
        age: u32,
        avatar_ref: impl Into<String>,
    ) -> Result<Self, LedgerError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(LedgerError::invalid_input("name", "child name cannot be empty"));
        }
        if !(MIN_CHILD_AGE..=MAX_CHILD_AGE).contains(&age) {
            return Err(LedgerError::invalid_input(
                "age",
                format!("age must be between {MIN_CHILD_AGE} and {MAX_CHILD_AGE}, got {age}"),
            ));
        }

        Ok(Self {
            id,
            name: name.to_string(),
            age,
            points: 0,
            avatar_ref: avatar_ref.into(),
            history: Vec::new(),
        })
    }

    pub fn id(&self) -> &ChildId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn age(&self) -> u32 {
        self.age
    }

    pub fn points(&self) -> u64 {
        self.points
    }

    pub fn avatar_ref(&self) -> &str {
        &self.avatar_ref
    }

    /// History ordered newest first.
    pub fn history(&self) -> &[ActivityRecord] {
        &self.history
    }

    /// Returns a copy with `record` prepended and the balance replaced.
    pub(crate) fn with_record(&self, record: ActivityRecord, points: u64) -> Self {
        let mut history = Vec::with_capacity(self.history.len() + 1);
        history.push(record);
        history.extend(self.history.iter().cloned());

        Self {
            id: self.id.clone(),
            name: self.name.clone(),
            age: self.age,
            points,
            avatar_ref: self.avatar_ref.clone(),
            history,
        }
    }
}

/// Point fields that older documents may hold as fractional JSON numbers.
///
/// Advisor deductions used to be stored unrounded, so `-2.5` is accepted and
/// rounded half away from zero, matching how new suggestions are decoded.
mod whole_points {
    use serde::{de::Error, Deserialize, Deserializer};

    // Largest magnitude an f64 still represents exactly as an integer.
    const MAX_EXACT: f64 = 9_007_199_254_740_991.0;

    fn finite<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        let value = f64::deserialize(deserializer)?;
        if !value.is_finite() || value.abs() > MAX_EXACT {
            return Err(D::Error::custom(format!("point value {value} is out of range")));
        }
        Ok(value.round())
    }

    pub fn signed<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
        finite(deserializer).map(|value| value as i64)
    }

    pub fn unsigned<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        let value = finite(deserializer)?;
        if value < 0.0 {
            return Err(D::Error::custom(format!("balance {value} is negative")));
        }
        Ok(value as u64)
    }
}

/// A chore that earns points when completed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chore {
    id: String,
    title: String,
    points: u32,
    is_recurring: bool,
}

impl Chore {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        points: u32,
        is_recurring: bool,
    ) -> Result<Self, LedgerError> {
        let id = id.into().trim().to_string();
        let title = title.into().trim().to_string();
        if id.is_empty() {
            return Err(LedgerError::invalid_input("chore.id", "chore id cannot be empty"));
        }
        if title.is_empty() {
            return Err(LedgerError::invalid_input(
                "chore.title",
                "chore title cannot be empty",
            ));
        }

        Ok(Self {
            id,
            title,
            points,
            is_recurring,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn points(&self) -> u32 {
        self.points
    }

    pub fn is_recurring(&self) -> bool {
        self.is_recurring
    }
}

/// A reward that can be bought with points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reward {
    id: String,
    title: String,
    cost: u32,
}

impl Reward {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        cost: u32,
    ) -> Result<Self, LedgerError> {
        let id = id.into().trim().to_string();
        let title = title.into().trim().to_string();
        if id.is_empty() {
            return Err(LedgerError::invalid_input("reward.id", "reward id cannot be empty"));
        }
        if title.is_empty() {
            return Err(LedgerError::invalid_input(
                "reward.title",
                "reward title cannot be empty",
            ));
        }

        Ok(Self { id, title, cost })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn cost(&self) -> u32 {
        self.cost
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn record_serializes_in_browser_document_shape() {
        let stamp = RecordStamp {
            id: RecordId::new("rec-1"),
            timestamp: Utc.timestamp_millis_opt(1_700_000_000_123).unwrap(),
        };
        let record = ActivityRecord::new(
            ActivityKind::RewardRedemption,
            "Redeemed: New Toy/Book",
            "Spent 500 points",
            -500,
            stamp,
        );

        let value = serde_json::to_value(&record).expect("record should serialize");
        assert_eq!(value["type"], "reward_redemption");
        assert_eq!(value["pointsChange"], -500);
        assert_eq!(value["timestamp"], 1_700_000_000_123_i64);

        let back: ActivityRecord = serde_json::from_value(value).expect("record should parse");
        assert_eq!(back, record);
    }

    #[test]
    fn fractional_points_from_older_documents_are_rounded() {
        let child: ChildProfile = serde_json::from_value(serde_json::json!({
            "id": "c1",
            "name": "Maya",
            "age": 8,
            "points": 7.5,
            "avatar": "avatar",
            "history": [{
                "id": "r-1",
                "type": "behavior",
                "description": "Talked back",
                "outcome": "Quiet reading time",
                "pointsChange": -2.5,
                "timestamp": 1_700_000_000_000_i64
            }]
        }))
        .expect("fractional points should decode");

        assert_eq!(child.points(), 8);
        assert_eq!(child.history()[0].points_change(), -3);

        let negative = serde_json::json!({
            "id": "c1", "name": "Maya", "age": 8, "points": -0.5, "avatar": "a"
        });
        assert!(serde_json::from_value::<ChildProfile>(negative).is_err());
    }

    #[test]
    fn child_profile_rejects_blank_name_and_out_of_range_age() {
        let blank = ChildProfile::new(ChildId::new("c1"), "   ", 8, "avatar");
        assert!(matches!(blank, Err(LedgerError::InvalidInput { field: "name", .. })));

        let too_young = ChildProfile::new(ChildId::new("c1"), "Maya", 0, "avatar");
        assert!(matches!(too_young, Err(LedgerError::InvalidInput { field: "age", .. })));

        let child = ChildProfile::new(ChildId::new("c1"), "  Maya ", 8, "avatar").unwrap();
        assert_eq!(child.name(), "Maya");
        assert_eq!(child.points(), 0);
        assert!(child.history().is_empty());
    }

    #[test]
    fn with_record_prepends_without_touching_original() {
        let child = ChildProfile::new(ChildId::new("c1"), "Maya", 8, "avatar").unwrap();
        let first = ActivityRecord::new(
            ActivityKind::Chore,
            "Completed: Make Bed",
            "Earned 10 points!",
            10,
            RecordStamp::now(),
        );
        let second = ActivityRecord::new(
            ActivityKind::Chore,
            "Completed: Pet Feeding",
            "Earned 10 points!",
            10,
            RecordStamp::now(),
        );

        let once = child.with_record(first.clone(), 10);
        let twice = once.with_record(second.clone(), 20);

        assert!(child.history().is_empty());
        assert_eq!(once.history(), &[first.clone()]);
        assert_eq!(twice.history(), &[second, first]);
        assert_eq!(twice.points(), 20);
    }

    #[test]
    fn catalog_entries_validate_identity() {
        assert!(Chore::new("", "Make Bed", 10, true).is_err());
        assert!(Chore::new("1", " ", 10, true).is_err());
        assert!(Reward::new("r1", "", 100).is_err());

        let reward = Reward::new(" r1 ", "30 Mins Screen Time", 100).unwrap();
        assert_eq!(reward.id(), "r1");
        assert_eq!(reward.cost(), 100);
    }
}
