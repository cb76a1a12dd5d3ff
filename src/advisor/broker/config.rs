use std::{env, fmt, time::Duration};

use super::AdvisorProviderKind;

const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_GEMINI_MODEL: &str = "gemini-3-flash-preview";
const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com";
const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
const DEFAULT_TEMPERATURE: f32 = 0.7;
const DEFAULT_MAX_OUTPUT_TOKENS: u16 = 400;
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Advisor configuration sourced from the environment.
#[derive(Debug, Clone)]
pub struct AdvisorConfig {
    pub provider: AdvisorProviderKind,
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub max_output_tokens: u16,
    pub temperature: f32,
    pub timeout: Duration,
}

impl AdvisorConfig {
    pub fn from_env() -> Result<Self, AdvisorConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the config from any variable source; `from_env` passes `std::env`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AdvisorConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let provider = match read("FAIRGUARD_ADVISOR") {
            None => AdvisorProviderKind::Gemini,
            Some(value) => match value.to_ascii_lowercase().as_str() {
                "gemini" => AdvisorProviderKind::Gemini,
                "openai" => AdvisorProviderKind::OpenAi,
                _ => return Err(AdvisorConfigError::UnknownProvider(value)),
            },
        };

        let (api_key, base_url, model) = match provider {
            AdvisorProviderKind::OpenAi => (
                read("OPENAI_API_KEY"),
                read("OPENAI_BASE_URL").unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string()),
                read("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
            ),
            _ => (
                read("GEMINI_API_KEY").or_else(|| read("API_KEY")),
                read("GEMINI_BASE_URL").unwrap_or_else(|| DEFAULT_GEMINI_BASE_URL.to_string()),
                read("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
            ),
        };
        let api_key = api_key.ok_or(AdvisorConfigError::MissingApiKey(provider))?;

        let timeout = read("ADVISOR_TIMEOUT_SECS")
            .and_then(|value| value.parse::<u64>().ok())
            .filter(|value| *value > 0)
            .map(Duration::from_secs)
            .unwrap_or_else(|| Duration::from_secs(DEFAULT_TIMEOUT_SECS));

        let max_output_tokens = read("ADVISOR_MAX_OUTPUT_TOKENS")
            .and_then(|value| value.parse::<u16>().ok())
            .filter(|value| *value > 0)
            .unwrap_or(DEFAULT_MAX_OUTPUT_TOKENS);

        let temperature = read("ADVISOR_TEMPERATURE")
            .and_then(|value| value.parse::<f32>().ok())
            .filter(|value| *value >= 0.0)
            .unwrap_or(DEFAULT_TEMPERATURE);

        Ok(Self {
            provider,
            api_key,
            base_url,
            model,
            max_output_tokens,
            temperature,
            timeout,
        })
    }

    fn trimmed_base(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    pub fn gemini_url(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.trimmed_base(),
            self.model
        )
    }

    pub fn chat_url(&self) -> String {
        format!("{}/v1/chat/completions", self.trimmed_base())
    }
}

#[derive(Debug)]
pub enum AdvisorConfigError {
    MissingApiKey(AdvisorProviderKind),
    UnknownProvider(String),
    ClientBuild(String),
}

impl fmt::Display for AdvisorConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingApiKey(AdvisorProviderKind::OpenAi) => write!(f, "missing OPENAI_API_KEY"),
            Self::MissingApiKey(_) => write!(f, "missing GEMINI_API_KEY"),
            Self::UnknownProvider(value) => write!(f, "unknown advisor provider '{}'", value),
            Self::ClientBuild(message) => write!(f, "client build failure: {}", message),
        }
    }
}

impl std::error::Error for AdvisorConfigError {}
