use reqwest::{blocking::Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::advisor::{
    errors::{AdvisorError, AdvisorErrorKind},
    types::{AdvisorRequestId, ConsequenceRequest, ConsequenceResponse},
};

use super::{
    compose_prompt,
    config::{AdvisorConfig, AdvisorConfigError},
    decode_suggestion, parse_retry_after, validate_request, AdvisorProviderKind,
    ConsequenceAdvisor, DEFAULT_RATE_LIMIT_BACKOFF, SYSTEM_INSTRUCTION,
};

const API_KEY_HEADER: &str = "x-goog-api-key";
const JSON_MIME_TYPE: &str = "application/json";

/// Gemini `generateContent` advisor using a structured response schema.
pub struct GeminiConsequenceAdvisor {
    http: Client,
    config: AdvisorConfig,
}

impl GeminiConsequenceAdvisor {
    pub fn new(config: AdvisorConfig) -> Result<Self, AdvisorConfigError> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|err| AdvisorConfigError::ClientBuild(err.to_string()))?;

        Ok(Self { http, config })
    }

    fn send(&self, request: &ConsequenceRequest) -> Result<String, AdvisorErrorKind> {
        let payload = build_payload(request, &self.config);

        let response = self
            .http
            .post(self.config.gemini_url())
            .header(API_KEY_HEADER, &self.config.api_key)
            .json(&payload)
            .send()
            .map_err(|err| AdvisorErrorKind::provider_failure(err.to_string()))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after =
                parse_retry_after(response.headers()).unwrap_or(DEFAULT_RATE_LIMIT_BACKOFF);
            return Err(AdvisorErrorKind::rate_limited(retry_after));
        }

        if !status.is_success() {
            if let Ok(body) = response.json::<GeminiErrorResponse>() {
                return Err(AdvisorErrorKind::provider_failure(format!(
                    "{} (status: {}, code: {})",
                    body.error.message,
                    body.error.status.unwrap_or_default(),
                    body.error.code
                )));
            }

            return Err(AdvisorErrorKind::provider_failure(format!(
                "HTTP {} from Gemini",
                status
            )));
        }

        let completion: GenerateContentResponse = response
            .json()
            .map_err(|err| AdvisorErrorKind::malformed_response(err.to_string()))?;

        first_candidate_text(completion).ok_or_else(|| {
            AdvisorErrorKind::malformed_response("Gemini returned no candidate text")
        })
    }
}

impl ConsequenceAdvisor for GeminiConsequenceAdvisor {
    fn provider_kind(&self) -> AdvisorProviderKind {
        AdvisorProviderKind::Gemini
    }

    fn suggest(
        &self,
        request_id: AdvisorRequestId,
        request: &ConsequenceRequest,
    ) -> Result<ConsequenceResponse, AdvisorError> {
        let fail = |kind| AdvisorError::new(request_id, self.provider_kind(), kind);

        validate_request(request).map_err(fail)?;
        let text = self.send(request).map_err(fail)?;
        let suggestion = decode_suggestion(&text).map_err(fail)?;

        Ok(ConsequenceResponse::new(
            request_id,
            self.provider_kind(),
            suggestion,
        ))
    }
}

fn build_payload(request: &ConsequenceRequest, config: &AdvisorConfig) -> GenerateContentRequest {
    GenerateContentRequest {
        system_instruction: Content {
            role: None,
            parts: vec![Part {
                text: SYSTEM_INSTRUCTION.to_string(),
            }],
        },
        contents: vec![Content {
            role: Some("user"),
            parts: vec![Part {
                text: compose_prompt(request),
            }],
        }],
        generation_config: GenerationConfig {
            response_mime_type: JSON_MIME_TYPE,
            response_schema: response_schema(),
            temperature: config.temperature,
            max_output_tokens: config.max_output_tokens.into(),
        },
    }
}

fn response_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "consequence": {
                "type": "STRING",
                "description": "The primary consequence suggested."
            },
            "reasoning": {
                "type": "STRING",
                "description": "Why this fits the child's age and the behavior."
            },
            "conversationStarter": {
                "type": "STRING",
                "description": "A question or statement to open dialogue."
            },
            "pointsDeduction": {
                "type": "NUMBER",
                "description": "A suggested point deduction (if any, keep it small, 0-50)."
            }
        },
        "required": ["consequence", "reasoning", "conversationStarter", "pointsDeduction"]
    })
}

fn first_candidate_text(response: GenerateContentResponse) -> Option<String> {
    response
        .candidates
        .into_iter()
        .filter_map(|candidate| candidate.content)
        .flat_map(|content| content.parts)
        .filter_map(|part| part.text)
        .map(|text| text.trim().to_string())
        .find(|text| !text.is_empty())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    system_instruction: Content,
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
    response_schema: Value,
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorResponse {
    error: GeminiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorDetail {
    code: i64,
    message: String,
    status: Option<String>,
}
