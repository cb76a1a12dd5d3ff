//! Shared request/response types exposed by the advisor module.
use std::fmt;

use serde::Serialize;

use super::broker::AdvisorProviderKind;

/// Identifier assigned to each consequence request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AdvisorRequestId(u64);

impl AdvisorRequestId {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for AdvisorRequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ADV-{:05}", self.0)
    }
}

/// What the advisor is asked about: who the child is and what happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsequenceRequest {
    pub child_name: String,
    pub child_age: u32,
    pub behavior: String,
}

impl ConsequenceRequest {
    pub fn new(child_name: impl Into<String>, child_age: u32, behavior: impl Into<String>) -> Self {
        Self {
            child_name: child_name.into(),
            child_age,
            behavior: behavior.into(),
        }
    }
}

/// A suggested consequence, staged until a parent confirms it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsequenceSuggestion {
    pub consequence: String,
    pub reasoning: String,
    pub conversation_starter: String,
    pub points_deduction: u32,
}

/// Result returned by advisor providers.
#[derive(Debug, Clone)]
pub struct ConsequenceResponse {
    pub request_id: AdvisorRequestId,
    pub provider: AdvisorProviderKind,
    pub suggestion: ConsequenceSuggestion,
}

impl ConsequenceResponse {
    pub fn new(
        request_id: AdvisorRequestId,
        provider: AdvisorProviderKind,
        suggestion: ConsequenceSuggestion,
    ) -> Self {
        Self {
            request_id,
            provider,
            suggestion,
        }
    }
}
