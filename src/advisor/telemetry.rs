//! Telemetry storage for advisor suggestions and failures.
use std::{
    collections::VecDeque,
    fs::{create_dir_all, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use bevy::prelude::*;
use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{
    broker::{AdvisorConnectionState, ConsequenceAdvisor},
    errors::{AdvisorError, AdvisorErrorKind},
    events::{ConsequenceFailedEvent, ConsequenceSuggestedEvent},
    types::ConsequenceResponse,
};

pub const DEFAULT_ADVISOR_TELEMETRY_LOG_PATH: &str = "logs/advisor_history.jsonl";
pub const DEFAULT_ADVISOR_TELEMETRY_CAPACITY: usize = 64;

/// Rolling in-memory record of recent advisor outcomes.
#[derive(Resource, Debug)]
pub struct AdvisorTelemetry {
    capacity: usize,
    records: VecDeque<AdvisorTelemetryRecord>,
}

impl AdvisorTelemetry {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            records: VecDeque::new(),
        }
    }

    pub fn push(&mut self, record: AdvisorTelemetryRecord) {
        while self.records.len() >= self.capacity {
            self.records.pop_front();
        }
        self.records.push_back(record);
    }

    #[allow(dead_code)]
    pub fn records(&self) -> impl Iterator<Item = &AdvisorTelemetryRecord> {
        self.records.iter()
    }

    #[allow(dead_code)]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl Default for AdvisorTelemetry {
    fn default() -> Self {
        Self::new(DEFAULT_ADVISOR_TELEMETRY_CAPACITY)
    }
}

#[derive(Debug, Clone)]
pub struct AdvisorTelemetryRecord {
    pub occurred_at: DateTime<Utc>,
    pub event: AdvisorTelemetryEvent,
}

#[derive(Debug, Clone)]
pub enum AdvisorTelemetryEvent {
    Suggestion(ConsequenceResponse),
    Failure(AdvisorError),
}

pub fn record_advisor_telemetry(
    mut telemetry: ResMut<AdvisorTelemetry>,
    mut suggestions: MessageReader<ConsequenceSuggestedEvent>,
    mut failures: MessageReader<ConsequenceFailedEvent>,
    mut log: ResMut<AdvisorTelemetryLog>,
) {
    let now = Utc::now();

    for event in suggestions.read() {
        let record = AdvisorTelemetryRecord {
            occurred_at: now,
            event: AdvisorTelemetryEvent::Suggestion(event.response.clone()),
        };
        log.push(&record);
        telemetry.push(record);
    }

    for event in failures.read() {
        let record = AdvisorTelemetryRecord {
            occurred_at: now,
            event: AdvisorTelemetryEvent::Failure(event.error.clone()),
        };
        log.push(&record);
        telemetry.push(record);
    }
}

/// Which advisor produced a line, and whether it was a live provider.
#[derive(Debug, Clone, Serialize)]
struct AdvisorStamp {
    provider: String,
    connection_state: AdvisorConnectionState,
}

/// Append-only JSONL log of advisor outcomes for offline inspection.
#[derive(Resource, Debug)]
pub struct AdvisorTelemetryLog {
    output_path: PathBuf,
    advisor: Option<AdvisorStamp>,
    pending: Vec<AdvisorTelemetryRecord>,
}

impl AdvisorTelemetryLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            output_path: path.into(),
            advisor: None,
            pending: Vec::new(),
        }
    }

    /// Stamps every written line with the advisor that produced it.
    pub fn with_advisor(mut self, advisor: &dyn ConsequenceAdvisor) -> Self {
        self.advisor = Some(AdvisorStamp {
            provider: advisor.provider_kind().to_string(),
            connection_state: advisor.connection_state(),
        });
        self
    }

    pub fn push(&mut self, record: &AdvisorTelemetryRecord) {
        self.pending.push(record.clone());
    }

    fn ensure_directory(&self) -> std::io::Result<()> {
        if let Some(parent) = self.output_path.parent() {
            create_dir_all(parent)?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> std::io::Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }

        self.ensure_directory()?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.output_path)?;

        for record in std::mem::take(&mut self.pending) {
            let line = SerializableTelemetryRecord {
                occurred_at_ms: record.occurred_at.timestamp_millis(),
                advisor: self.advisor.clone(),
                event: record.event.into(),
            };
            serde_json::to_writer(&mut file, &line)?;
            file.write_all(b"\n")?;
        }

        file.flush()?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.output_path
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl Default for AdvisorTelemetryLog {
    fn default() -> Self {
        Self::new(DEFAULT_ADVISOR_TELEMETRY_LOG_PATH)
    }
}

pub fn flush_advisor_telemetry_log(mut log: ResMut<AdvisorTelemetryLog>) {
    if let Err(err) = log.flush() {
        warn!(
            "Failed to persist advisor telemetry to {:?}: {}",
            log.path(),
            err
        );
    }
}

#[derive(Serialize)]
struct SerializableTelemetryRecord {
    occurred_at_ms: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    advisor: Option<AdvisorStamp>,
    event: SerializableTelemetryEvent,
}

#[derive(Serialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
enum SerializableTelemetryEvent {
    Suggestion {
        request_id: u64,
        provider: String,
        consequence: String,
        points_deduction: u32,
    },
    Failure {
        request_id: u64,
        provider: String,
        error: SerializableAdvisorError,
    },
}

impl From<AdvisorTelemetryEvent> for SerializableTelemetryEvent {
    fn from(value: AdvisorTelemetryEvent) -> Self {
        match value {
            AdvisorTelemetryEvent::Suggestion(response) => Self::Suggestion {
                request_id: response.request_id.value(),
                provider: response.provider.to_string(),
                consequence: response.suggestion.consequence,
                points_deduction: response.suggestion.points_deduction,
            },
            AdvisorTelemetryEvent::Failure(error) => Self::Failure {
                request_id: error.request_id.value(),
                provider: error.provider.to_string(),
                error: error.kind.into(),
            },
        }
    }
}

#[derive(Serialize)]
#[serde(tag = "error_kind", rename_all = "snake_case")]
enum SerializableAdvisorError {
    RateLimited { retry_after_seconds: f32 },
    ProviderFailure { message: String },
    MalformedResponse { message: String },
    InvalidRequest { message: String },
    Cancelled,
}

impl From<AdvisorErrorKind> for SerializableAdvisorError {
    fn from(value: AdvisorErrorKind) -> Self {
        match value {
            AdvisorErrorKind::RateLimited {
                retry_after_seconds,
            } => Self::RateLimited {
                retry_after_seconds,
            },
            AdvisorErrorKind::ProviderFailure { message } => Self::ProviderFailure { message },
            AdvisorErrorKind::MalformedResponse { message } => Self::MalformedResponse { message },
            AdvisorErrorKind::InvalidRequest { message } => Self::InvalidRequest { message },
            AdvisorErrorKind::Cancelled => Self::Cancelled,
        }
    }
}
