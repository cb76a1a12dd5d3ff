use reqwest::{blocking::Client, StatusCode};
use serde::{Deserialize, Serialize};

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

const JSON_OBJECT_FORMAT: &str = "json_object";

/// Chat-completions advisor for OpenAI-compatible endpoints.
pub struct OpenAiConsequenceAdvisor {
    http: Client,
    config: AdvisorConfig,
}

impl OpenAiConsequenceAdvisor {
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
            .post(self.config.chat_url())
            .bearer_auth(&self.config.api_key)
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
            if let Ok(body) = response.json::<OpenAiErrorResponse>() {
                let message = format!(
                    "{} (type: {}, code: {:?})",
                    body.error.message, body.error.error_type, body.error.code
                );
                return Err(AdvisorErrorKind::provider_failure(message));
            }

            return Err(AdvisorErrorKind::provider_failure(format!(
                "HTTP {} from OpenAI",
                status
            )));
        }

        let completion: ChatCompletionResponse = response
            .json()
            .map_err(|err| AdvisorErrorKind::malformed_response(err.to_string()))?;

        completion
            .choices
            .into_iter()
            .find_map(|choice| choice.message.content)
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .ok_or_else(|| {
                AdvisorErrorKind::malformed_response(
                    "OpenAI returned an empty completion for consequence request",
                )
            })
    }
}

impl ConsequenceAdvisor for OpenAiConsequenceAdvisor {
    fn provider_kind(&self) -> AdvisorProviderKind {
        AdvisorProviderKind::OpenAi
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

fn build_payload<'a>(
    request: &ConsequenceRequest,
    config: &'a AdvisorConfig,
) -> ChatCompletionRequest<'a> {
    ChatCompletionRequest {
        model: config.model.as_str(),
        messages: build_messages(request),
        max_tokens: Some(config.max_output_tokens.into()),
        temperature: config.temperature,
        response_format: ResponseFormat {
            format_type: JSON_OBJECT_FORMAT,
        },
    }
}

fn build_messages(request: &ConsequenceRequest) -> Vec<ChatMessage> {
    vec![
        ChatMessage {
            role: "system",
            content: SYSTEM_INSTRUCTION.to_string(),
        },
        ChatMessage {
            role: "user",
            content: compose_prompt(request),
        },
    ]
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    #[serde(rename = "max_tokens")]
    max_tokens: Option<u32>,
    temperature: f32,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorResponse {
    error: OpenAiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorDetail {
    message: String,
    #[serde(rename = "type")]
    error_type: String,
    code: Option<String>,
}
