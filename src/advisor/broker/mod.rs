//! Consequence advisor trait, shared prompt/response handling, and provider selection.

pub mod config;
pub mod fallback;
pub mod gemini;
pub mod openai;

pub use fallback::FallbackConsequenceAdvisor;
pub use gemini::GeminiConsequenceAdvisor;
pub use openai::OpenAiConsequenceAdvisor;

use std::fmt;

use bevy::log::warn;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use serde::{Deserialize, Serialize};

use super::{
    errors::{AdvisorError, AdvisorErrorKind},
    types::{AdvisorRequestId, ConsequenceRequest, ConsequenceResponse, ConsequenceSuggestion},
};
use config::{AdvisorConfig, AdvisorConfigError};

/// Fixed policy sent with every request; not user-editable.
pub const SYSTEM_INSTRUCTION: &str = "You are an expert child psychologist and parenting coach. Your philosophy is restorative justice, empathy, and consistent boundaries. You believe consequences should be related, respectful, and reasonable. Never suggest physical punishment or shaming.";

/// Backoff reported when a 429 carries no usable `Retry-After`.
pub(crate) const DEFAULT_RATE_LIMIT_BACKOFF: f32 = 10.0;

const EMPTY_BEHAVIOR_ERROR: &str = "behavior description cannot be empty";
const EMPTY_NAME_ERROR: &str = "child name cannot be empty";
const ZERO_AGE_ERROR: &str = "child age must be positive";

/// Advisor provider flavours we can route to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdvisorProviderKind {
    Gemini,
    OpenAi,
    Local,
}

impl fmt::Display for AdvisorProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Gemini => "gemini",
            Self::OpenAi => "openai",
            Self::Local => "local",
        };
        write!(f, "{}", label)
    }
}

/// Whether an advisor talks to a real provider or answers locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AdvisorConnectionState {
    Live,
    Fallback,
}

impl AdvisorConnectionState {
    pub fn label(self) -> &'static str {
        match self {
            Self::Live => "live",
            Self::Fallback => "fallback",
        }
    }
}

/// Contract every consequence backend must satisfy.
///
/// Calls may block on network I/O; callers run them off the main schedule.
pub trait ConsequenceAdvisor: Send + Sync {
    fn provider_kind(&self) -> AdvisorProviderKind;

    fn connection_state(&self) -> AdvisorConnectionState {
        AdvisorConnectionState::Live
    }

    fn suggest(
        &self,
        request_id: AdvisorRequestId,
        request: &ConsequenceRequest,
    ) -> Result<ConsequenceResponse, AdvisorError>;
}

/// Builds the configured live advisor, or the local fallback when it cannot be built.
pub fn advisor_from_env() -> Box<dyn ConsequenceAdvisor> {
    let built = AdvisorConfig::from_env().and_then(|config| match config.provider {
        AdvisorProviderKind::OpenAi => OpenAiConsequenceAdvisor::new(config)
            .map(|advisor| Box::new(advisor) as Box<dyn ConsequenceAdvisor>),
        _ => GeminiConsequenceAdvisor::new(config)
            .map(|advisor| Box::new(advisor) as Box<dyn ConsequenceAdvisor>),
    });

    match built {
        Ok(advisor) => advisor,
        Err(AdvisorConfigError::MissingApiKey(provider)) => {
            warn!(
                "No API key for the {} advisor; consequence suggestions use local fallback responses.",
                provider
            );
            Box::new(FallbackConsequenceAdvisor)
        }
        Err(err) => {
            warn!(
                "Advisor running in fallback mode ({}). Check the advisor environment.",
                err
            );
            Box::new(FallbackConsequenceAdvisor)
        }
    }
}

pub(crate) fn validate_request(request: &ConsequenceRequest) -> Result<(), AdvisorErrorKind> {
    if request.behavior.trim().is_empty() {
        return Err(AdvisorErrorKind::invalid_request(EMPTY_BEHAVIOR_ERROR));
    }
    if request.child_name.trim().is_empty() {
        return Err(AdvisorErrorKind::invalid_request(EMPTY_NAME_ERROR));
    }
    if request.child_age == 0 {
        return Err(AdvisorErrorKind::invalid_request(ZERO_AGE_ERROR));
    }
    Ok(())
}

pub(crate) fn compose_prompt(request: &ConsequenceRequest) -> String {
    format!(
        "The child named {}, who is {} years old, exhibited the following behavior: \"{}\".\n\
         Generate a fair, reasonable, and age-appropriate consequence or restorative action.\n\
         Explain why this is a fair consequence and suggest a positive conversation starter to have with the child.\n\
         Suggest a small point deduction between 0 and 50, or 0 if none is warranted.\n\
         Format your response as a JSON object with the keys consequence, reasoning, conversationStarter and pointsDeduction.",
        request.child_name.trim(),
        request.child_age,
        request.behavior.trim()
    )
}

/// Seconds from a numeric `Retry-After` header; HTTP-date values are ignored.
pub(crate) fn parse_retry_after(headers: &HeaderMap) -> Option<f32> {
    headers
        .get(RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|text| text.trim().parse::<f32>().ok())
        .filter(|seconds| seconds.is_finite() && *seconds >= 0.0)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSuggestion {
    consequence: String,
    reasoning: String,
    conversation_starter: String,
    points_deduction: f64,
}

/// Parses the provider's JSON text into a validated suggestion.
pub(crate) fn decode_suggestion(text: &str) -> Result<ConsequenceSuggestion, AdvisorErrorKind> {
    let body = strip_code_fence(text);
    let raw: RawSuggestion = serde_json::from_str(body)
        .map_err(|err| AdvisorErrorKind::malformed_response(err.to_string()))?;

    if raw.consequence.trim().is_empty() {
        return Err(AdvisorErrorKind::malformed_response(
            "consequence text is empty",
        ));
    }
    if !raw.points_deduction.is_finite() || raw.points_deduction < 0.0 {
        return Err(AdvisorErrorKind::malformed_response(format!(
            "pointsDeduction must be a non-negative number, got {}",
            raw.points_deduction
        )));
    }
    if raw.points_deduction > f64::from(u32::MAX) {
        return Err(AdvisorErrorKind::malformed_response(format!(
            "pointsDeduction {} is out of range",
            raw.points_deduction
        )));
    }

    Ok(ConsequenceSuggestion {
        consequence: raw.consequence.trim().to_string(),
        reasoning: raw.reasoning.trim().to_string(),
        conversation_starter: raw.conversation_starter.trim().to_string(),
        points_deduction: raw.points_deduction.round() as u32,
    })
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner.strip_suffix("```").unwrap_or(inner).trim()
}


#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    const VALID: &str = r#"{
        "consequence": "Help set the table tonight",
        "reasoning": "Connects the action to family responsibility",
        "conversationStarter": "How do you think your sister felt?",
        "pointsDeduction": 12.6
    }"#;

    #[test]
    fn decodes_and_rounds_points() {
        let suggestion = decode_suggestion(VALID).expect("valid payload should decode");
        assert_eq!(suggestion.consequence, "Help set the table tonight");
        assert_eq!(suggestion.points_deduction, 13);
    }

    #[test]
    fn accepts_fenced_json() {
        let fenced = format!("```json\n{VALID}\n```");
        assert!(decode_suggestion(&fenced).is_ok());
    }

    #[test]
    fn rejects_schema_violations() {
        let negative = VALID.replace("12.6", "-4");
        let missing = r#"{"consequence":"x","reasoning":"y","conversationStarter":"z"}"#;
        let blank = VALID.replace("Help set the table tonight", " ");

        for payload in [negative.as_str(), missing, blank.as_str(), "not json"] {
            assert!(
                matches!(
                    decode_suggestion(payload),
                    Err(AdvisorErrorKind::MalformedResponse { .. })
                ),
                "payload should be rejected: {payload}"
            );
        }
    }

    #[test]
    fn prompt_names_child_age_and_behavior() {
        let request = ConsequenceRequest::new("Maya", 8, "  threw a toy  ");
        let prompt = compose_prompt(&request);
        assert!(prompt.contains("The child named Maya, who is 8 years old"));
        assert!(prompt.contains("\"threw a toy\""));
    }

    #[test]
    fn retry_after_accepts_only_numeric_seconds() {
        let mut headers = HeaderMap::new();
        assert_eq!(parse_retry_after(&headers), None);

        headers.insert(RETRY_AFTER, HeaderValue::from_static("3"));
        assert_eq!(parse_retry_after(&headers), Some(3.0));

        headers.insert(RETRY_AFTER, HeaderValue::from_static(" 2.5 "));
        assert_eq!(parse_retry_after(&headers), Some(2.5));

        headers.insert(RETRY_AFTER, HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"));
        assert_eq!(parse_retry_after(&headers), None);

        headers.insert(RETRY_AFTER, HeaderValue::from_static("-1"));
        assert_eq!(parse_retry_after(&headers), None);
    }

    #[test]
    fn validation_rejects_blank_fields() {
        assert!(validate_request(&ConsequenceRequest::new("Maya", 8, " ")).is_err());
        assert!(validate_request(&ConsequenceRequest::new(" ", 8, "hit")).is_err());
        assert!(validate_request(&ConsequenceRequest::new("Maya", 0, "hit")).is_err());
        assert!(validate_request(&ConsequenceRequest::new("Maya", 8, "hit")).is_ok());
    }
}
