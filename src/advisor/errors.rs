//! Error types surfaced by consequence advisors.
//!
//! Every variant means the advisor is unavailable for this request: nothing
//! touches the ledger and the caller may retry with the same draft.
use std::fmt;

use super::{broker::AdvisorProviderKind, types::AdvisorRequestId};

/// Error categories returned when requesting a consequence.
#[derive(Debug, Clone, PartialEq)]
pub enum AdvisorErrorKind {
    RateLimited { retry_after_seconds: f32 },
    ProviderFailure { message: String },
    MalformedResponse { message: String },
    InvalidRequest { message: String },
    Cancelled,
}

impl AdvisorErrorKind {
    pub fn rate_limited(retry_after_seconds: f32) -> Self {
        Self::RateLimited {
            retry_after_seconds,
        }
    }

    pub fn provider_failure(message: impl Into<String>) -> Self {
        Self::ProviderFailure {
            message: message.into(),
        }
    }

    pub fn malformed_response(message: impl Into<String>) -> Self {
        Self::MalformedResponse {
            message: message.into(),
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    /// Whether sending the same request again may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. } | Self::ProviderFailure { .. } | Self::MalformedResponse { .. }
        )
    }
}

impl fmt::Display for AdvisorErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RateLimited {
                retry_after_seconds,
            } => write!(f, "Rate limited. Retry after {:.2}s", retry_after_seconds),
            Self::ProviderFailure { message } => write!(f, "Provider failure: {}", message),
            Self::MalformedResponse { message } => write!(f, "Malformed response: {}", message),
            Self::InvalidRequest { message } => write!(f, "Invalid request: {}", message),
            Self::Cancelled => write!(f, "Request cancelled"),
        }
    }
}

/// Full error with provider metadata and request id.
#[derive(Debug, Clone, PartialEq)]
pub struct AdvisorError {
    pub request_id: AdvisorRequestId,
    pub provider: AdvisorProviderKind,
    pub kind: AdvisorErrorKind,
}

impl AdvisorError {
    pub fn new(
        request_id: AdvisorRequestId,
        provider: AdvisorProviderKind,
        kind: AdvisorErrorKind,
    ) -> Self {
        Self {
            request_id,
            provider,
            kind,
        }
    }
}

impl fmt::Display for AdvisorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Advisor unavailable ({} - request {}): {}",
            self.provider, self.request_id, self.kind
        )
    }
}

impl std::error::Error for AdvisorError {}
