//! Encoding, validation, and load/save of the persisted state document.
use std::{collections::HashSet, fmt, io};

use chrono::Utc;
use serde_json::Value;

use crate::ledger::{engine::clamp_balance, state::AppState};

use super::kv::KeyValueStore;

/// Fixed key the state document lives under.
pub const STATE_KEY: &str = "fairguard_state";

/// Documents written before versioning carry no `version` field.
pub const LEGACY_DOCUMENT_VERSION: u64 = 1;
pub const CURRENT_DOCUMENT_VERSION: u64 = 1;

const VERSION_FIELD: &str = "version";
const CORRUPT_KEY_INFIX: &str = ".corrupt-";

#[derive(Debug)]
pub enum StoreError {
    Io(io::Error),
    Serde(serde_json::Error),
    CorruptPersistedState { reason: String },
}

impl StoreError {
    pub fn corrupt(reason: impl Into<String>) -> Self {
        Self::CorruptPersistedState {
            reason: reason.into(),
        }
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "storage io error: {err}"),
            Self::Serde(err) => write!(f, "serde error: {err}"),
            Self::CorruptPersistedState { reason } => {
                write!(f, "corrupt persisted state: {reason}")
            }
        }
    }
}

impl std::error::Error for StoreError {}

impl From<io::Error> for StoreError {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serde(value)
    }
}

/// A decoded document plus anything non-fatal noticed while loading it.
#[derive(Debug)]
pub struct DecodedState {
    pub state: AppState,
    pub notices: Vec<String>,
}

/// What `load_or_default` produced and why.
#[derive(Debug, Default)]
pub struct LoadOutcome {
    pub state: AppState,
    pub notices: Vec<String>,
    pub warning: Option<StoreError>,
    /// Key the unreadable document was copied to before starting empty.
    pub preserved_as: Option<String>,
}

pub fn encode_state(state: &AppState) -> Result<String, StoreError> {
    let mut document = serde_json::to_value(state)?;
    if let Value::Object(fields) = &mut document {
        fields.insert(
            VERSION_FIELD.to_string(),
            Value::from(CURRENT_DOCUMENT_VERSION),
        );
    }
    Ok(serde_json::to_string(&document)?)
}

/// Parses and validates a stored document. Every failure is `CorruptPersistedState`.
pub fn decode_state(raw: &str) -> Result<DecodedState, StoreError> {
    let document: Value = serde_json::from_str(raw)
        .map_err(|err| StoreError::corrupt(format!("document is not valid JSON ({err})")))?;

    if !document.is_object() {
        return Err(StoreError::corrupt("document root is not an object"));
    }

    let version = match document.get(VERSION_FIELD) {
        None | Some(Value::Null) => LEGACY_DOCUMENT_VERSION,
        Some(value) => value
            .as_u64()
            .ok_or_else(|| StoreError::corrupt(format!("invalid document version {value}")))?,
    };
    if version > CURRENT_DOCUMENT_VERSION {
        return Err(StoreError::corrupt(format!(
            "document version {version} is newer than supported version {CURRENT_DOCUMENT_VERSION}"
        )));
    }

    let state: AppState = serde_json::from_value(document)
        .map_err(|err| StoreError::corrupt(format!("unexpected document shape ({err})")))?;

    validate(state)
}

fn validate(state: AppState) -> Result<DecodedState, StoreError> {
    let mut seen = HashSet::new();
    for child in state.children() {
        if child.id().as_str().trim().is_empty() {
            return Err(StoreError::corrupt("child with an empty id"));
        }
        if !seen.insert(child.id().clone()) {
            return Err(StoreError::corrupt(format!(
                "duplicate child id {}",
                child.id()
            )));
        }
        if child.age() == 0 {
            return Err(StoreError::corrupt(format!(
                "child {} has a non-positive age",
                child.id()
            )));
        }
    }

    let mut notices = Vec::new();
    for child in state.children() {
        let replayed = child
            .history()
            .iter()
            .rev()
            .fold(0, |balance, record| clamp_balance(balance, record.points_change()));
        if replayed != child.points() {
            notices.push(format!(
                "child {} has {} points but its history adds up to {}; keeping the stored balance",
                child.id(),
                child.points(),
                replayed
            ));
        }
    }

    let dangling = state
        .selected_child_id()
        .filter(|selected| state.child(selected).is_none())
        .cloned();
    let state = match dangling {
        Some(selected) => {
            notices.push(format!(
                "selected child {selected} does not exist; clearing selection"
            ));
            state.with_selection(None)
        }
        None => state,
    };

    Ok(DecodedState { state, notices })
}

/// Reads the state document, falling back to the empty state on any failure.
///
/// A document that cannot be decoded is copied under a `fairguard_state.corrupt-<ms>`
/// key first, so the next save never destroys the only copy.
pub fn load_or_default(store: &dyn KeyValueStore) -> LoadOutcome {
    let raw = match store.get(STATE_KEY) {
        Ok(Some(raw)) => raw,
        Ok(None) => return LoadOutcome::default(),
        Err(err) => {
            return LoadOutcome {
                warning: Some(err.into()),
                ..LoadOutcome::default()
            }
        }
    };

    match decode_state(&raw) {
        Ok(decoded) => LoadOutcome {
            state: decoded.state,
            notices: decoded.notices,
            ..LoadOutcome::default()
        },
        Err(err) => {
            let backup_key = format!(
                "{STATE_KEY}{CORRUPT_KEY_INFIX}{}",
                Utc::now().timestamp_millis()
            );
            let mut outcome = LoadOutcome {
                warning: Some(err),
                ..LoadOutcome::default()
            };
            match store.set(&backup_key, &raw) {
                Ok(()) => outcome.preserved_as = Some(backup_key),
                Err(err) => outcome
                    .notices
                    .push(format!("could not preserve the unreadable document: {err}")),
            }
            outcome
        }
    }
}

pub fn save(store: &dyn KeyValueStore, state: &AppState) -> Result<(), StoreError> {
    let encoded = encode_state(state)?;
    store.set(STATE_KEY, &encoded)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{
        engine::{add_child, apply_chore_completion},
        types::{Chore, RecordStamp},
    };
    use crate::store::kv::MemoryKeyValueStore;

    fn populated_state() -> AppState {
        let avatars = vec!["avatar".to_string()];
        let (state, maya) = add_child(&AppState::default(), "Maya", 8, &avatars).unwrap();
        let (state, _) = add_child(&state, "Leo", 5, &avatars).unwrap();
        let chore = Chore::new("1", "Make Bed", 10, true).unwrap();
        apply_chore_completion(&state, &maya, &chore, RecordStamp::now())
            .unwrap()
            .unwrap()
    }

    #[test]
    fn save_then_load_returns_equal_state() {
        let store = MemoryKeyValueStore::new();
        let state = populated_state();

        save(&store, &state).expect("save should succeed");
        let outcome = load_or_default(&store);

        assert!(outcome.warning.is_none());
        assert!(outcome.notices.is_empty());
        assert_eq!(outcome.state, state);

        let raw = store.get(STATE_KEY).unwrap().unwrap();
        let value: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["version"], 1);
        assert!(value["selectedChildId"].is_string());
        assert_eq!(value["children"][0]["history"][0]["type"], "chore");
    }

    #[test]
    fn missing_document_starts_empty_without_warning() {
        let outcome = load_or_default(&MemoryKeyValueStore::new());
        assert!(outcome.state.is_empty());
        assert!(outcome.warning.is_none());
        assert!(outcome.preserved_as.is_none());
    }

    #[test]
    fn unparsable_document_is_preserved_before_falling_back() {
        let store = MemoryKeyValueStore::with_entry(STATE_KEY, "{not json");
        let outcome = load_or_default(&store);

        assert!(outcome.state.is_empty());
        assert!(matches!(
            outcome.warning,
            Some(StoreError::CorruptPersistedState { .. })
        ));

        let backup_key = outcome.preserved_as.expect("corrupt document should be copied aside");
        assert!(backup_key.starts_with("fairguard_state.corrupt-"));
        assert_eq!(store.get(&backup_key).unwrap().as_deref(), Some("{not json"));

        save(&store, &populated_state()).unwrap();
        assert_eq!(store.get(&backup_key).unwrap().as_deref(), Some("{not json"));
    }

    #[test]
    fn fractional_legacy_points_load_instead_of_being_discarded() {
        let raw = r#"{
            "children": [{
                "id": "c1",
                "name": "Maya",
                "age": 8,
                "points": 7.5,
                "avatar": "x",
                "history": [
                    {"id":"r-2","type":"behavior","description":"Talked back","outcome":"Quiet time","pointsChange":-2.5,"timestamp":1700000060000},
                    {"id":"r-1","type":"chore","description":"Completed: Make Bed","outcome":"Earned 10 points!","pointsChange":10,"timestamp":1700000000000}
                ]
            }],
            "selectedChildId": "c1"
        }"#;
        let store = MemoryKeyValueStore::with_entry(STATE_KEY, raw);
        let outcome = load_or_default(&store);

        assert!(outcome.warning.is_none());
        let child = outcome.state.selected_child().expect("child should survive");
        assert_eq!(child.points(), 8);
        assert_eq!(child.history()[0].points_change(), -3);
        // Rounding both sides separately leaves the balance one off its replay.
        assert_eq!(outcome.notices.len(), 1);
    }

    #[test]
    fn legacy_browser_document_loads() {
        let raw = r#"{
            "children": [{
                "id": "0b8f",
                "name": "Maya",
                "age": 8,
                "points": 5,
                "avatar": "https://picsum.photos/seed/child1/200",
                "history": [{
                    "id": "r-2",
                    "type": "behavior",
                    "description": "Hit sibling",
                    "outcome": "Quiet time",
                    "pointsChange": -15,
                    "timestamp": 1700000060000
                }, {
                    "id": "r-1",
                    "type": "chore",
                    "description": "Completed: Empty Dishwasher",
                    "outcome": "Earned 20 points!",
                    "pointsChange": 20,
                    "timestamp": 1700000000000
                }]
            }],
            "selectedChildId": "0b8f"
        }"#;

        let decoded = decode_state(raw).expect("legacy document should decode");
        let child = decoded.state.selected_child().expect("selection should resolve");
        assert_eq!(child.points(), 5);
        assert_eq!(child.history()[0].points_change(), -15);
        assert!(decoded.notices.is_empty());
    }

    #[test]
    fn balance_that_disagrees_with_history_is_noticed() {
        let raw = r#"{"children":[{"id":"a","name":"A","age":8,"points":500,"avatar":"x","history":[]}]}"#;
        let decoded = decode_state(raw).expect("mismatch is not fatal");
        assert_eq!(decoded.state.children()[0].points(), 500);
        assert_eq!(decoded.notices.len(), 1);
        assert!(decoded.notices[0].contains("history adds up to 0"));
    }

    #[test]
    fn shape_violations_are_corrupt() {
        let negative_points = r#"{"children":[{"id":"a","name":"A","age":8,"points":-1,"avatar":"x","history":[]}]}"#;
        let duplicate_ids = r#"{"children":[
            {"id":"a","name":"A","age":8,"points":0,"avatar":"x","history":[]},
            {"id":"a","name":"B","age":9,"points":0,"avatar":"x","history":[]}
        ]}"#;
        let zero_age = r#"{"children":[{"id":"a","name":"A","age":0,"points":0,"avatar":"x","history":[]}]}"#;
        let future = r#"{"version":7,"children":[]}"#;
        let not_object = "[1,2,3]";

        for raw in [negative_points, duplicate_ids, zero_age, future, not_object] {
            assert!(
                matches!(
                    decode_state(raw),
                    Err(StoreError::CorruptPersistedState { .. })
                ),
                "expected corrupt state for {raw}"
            );
        }
    }

    #[test]
    fn dangling_selection_is_repaired() {
        let raw = r#"{"children":[],"selectedChildId":"gone"}"#;
        let decoded = decode_state(raw).expect("dangling selection is repairable");
        assert!(decoded.state.selected_child_id().is_none());
        assert_eq!(decoded.notices.len(), 1);
    }
}
