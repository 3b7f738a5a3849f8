use std::env;
use std::time::Duration;

use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{Value, json};
use thiserror::Error;
use tokio::time::sleep;

use super::gateway::{
    LlmGateway, LlmGatewayError, LlmGatewayRequest, LlmJsonFuture, LlmTextFuture,
};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_MAX_RETRIES: u32 = 2;
const DEFAULT_RETRY_BASE_BACKOFF_MS: u64 = 250;

const DEFAULT_PRIMARY_MODEL: &str = "gemini-2.5-flash";
const DEFAULT_FALLBACK_MODEL: &str = "gemini-2.0-flash";

#[derive(Debug, Clone)]
pub struct GeminiModelRoute {
    pub primary_model: String,
    pub fallback_model: Option<String>,
}

impl GeminiModelRoute {
    fn candidate_models(&self) -> Vec<&str> {
        let mut candidates = Vec::new();
        if !self.primary_model.is_empty() {
            candidates.push(self.primary_model.as_str());
        }
        if let Some(fallback_model) = self.fallback_model.as_deref()
            && !fallback_model.is_empty()
            && fallback_model != self.primary_model
        {
            candidates.push(fallback_model);
        }
        candidates
    }
}

#[derive(Debug, Clone)]
pub struct GeminiGatewayConfig {
    pub base_url: String,
    pub api_key: String,
    pub timeout_ms: u64,
    pub max_retries: u32,
    pub retry_base_backoff_ms: u64,
    pub model_route: GeminiModelRoute,
}

impl GeminiGatewayConfig {
    pub fn from_env() -> Result<Self, GeminiConfigError> {
        let api_key = require_non_empty_env("GEMINI_API_KEY")?;
        let base_url = optional_trimmed_env("GEMINI_BASE_URL")
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(GeminiConfigError::InvalidConfiguration(
                "GEMINI_BASE_URL must start with http:// or https://".to_string(),
            ));
        }

        Ok(Self {
            base_url,
            api_key,
            timeout_ms: parse_u64_env("GEMINI_TIMEOUT_MS", DEFAULT_TIMEOUT_MS)?,
            max_retries: parse_u32_env("GEMINI_MAX_RETRIES", DEFAULT_MAX_RETRIES)?,
            retry_base_backoff_ms: parse_u64_env(
                "GEMINI_RETRY_BASE_BACKOFF_MS",
                DEFAULT_RETRY_BASE_BACKOFF_MS,
            )?,
            model_route: GeminiModelRoute {
                primary_model: optional_trimmed_env("GEMINI_MODEL_PRIMARY")
                    .unwrap_or_else(|| DEFAULT_PRIMARY_MODEL.to_string()),
                fallback_model: optional_trimmed_env("GEMINI_MODEL_FALLBACK")
                    .or_else(|| Some(DEFAULT_FALLBACK_MODEL.to_string())),
            },
        })
    }
}

#[derive(Debug, Error)]
pub enum GeminiConfigError {
    #[error("missing required env var {0}")]
    MissingVar(String),
    #[error("invalid integer in env var {key}: {value}")]
    ParseInt { key: String, value: String },
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("failed to build Gemini http client: {0}")]
    HttpClient(String),
}

#[derive(Clone)]
pub struct GeminiGateway {
    client: reqwest::Client,
    config: GeminiGatewayConfig,
}

enum ResponseMode {
    Json,
    Text { web_search: bool },
}

impl GeminiGateway {
    pub fn new(config: GeminiGatewayConfig) -> Result<Self, GeminiConfigError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|err| GeminiConfigError::HttpClient(err.to_string()))?;

        Ok(Self { client, config })
    }

    async fn generate_for_model(
        &self,
        model: &str,
        request: &LlmGatewayRequest,
        mode: &ResponseMode,
    ) -> Result<String, ModelAttemptError> {
        let mut attempt = 0_u32;

        loop {
            match self.send_once(model, request, mode).await {
                Ok(text) => return Ok(text),
                Err(err) => {
                    if err.retryable && attempt < self.config.max_retries {
                        let backoff_multiplier = 2_u64.saturating_pow(attempt);
                        let backoff_ms = self
                            .config
                            .retry_base_backoff_ms
                            .saturating_mul(backoff_multiplier);
                        sleep(Duration::from_millis(backoff_ms)).await;
                        attempt = attempt.saturating_add(1);
                        continue;
                    }

                    return Err(ModelAttemptError {
                        error: err.error,
                        fallback_allowed: err.fallback_allowed,
                    });
                }
            }
        }
    }

    async fn send_once(
        &self,
        model: &str,
        request: &LlmGatewayRequest,
        mode: &ResponseMode,
    ) -> Result<String, SendAttemptError> {
        let mut body = json!({
            "systemInstruction": {
                "parts": [{ "text": request.system_prompt }]
            },
            "contents": [{
                "role": "user",
                "parts": [{ "text": request.user_prompt }]
            }],
            "generationConfig": {
                "temperature": 0
            }
        });

        match mode {
            ResponseMode::Json => {
                body["generationConfig"]["responseMimeType"] = json!("application/json");
            }
            ResponseMode::Text { web_search: true } => {
                body["tools"] = json!([{ "google_search": {} }]);
            }
            ResponseMode::Text { web_search: false } => {}
        }

        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.config.base_url, model, self.config.api_key
        );

        let response = self.client.post(&url).json(&body).send().await.map_err(|err| {
            if err.is_timeout() {
                SendAttemptError::retryable(LlmGatewayError::Timeout, true)
            } else {
                SendAttemptError::retryable(
                    LlmGatewayError::ProviderFailure("request_unavailable".to_string()),
                    true,
                )
            }
        })?;

        let status = response.status();
        let payload = response.text().await.map_err(|_| {
            SendAttemptError::non_retryable(
                LlmGatewayError::InvalidProviderPayload("response_body_read_failed".to_string()),
                true,
            )
        })?;

        if !status.is_success() {
            return Err(SendAttemptError {
                error: LlmGatewayError::ProviderFailure(format!(
                    "status={} model={model}",
                    status.as_u16()
                )),
                retryable: is_retryable_status(status),
                fallback_allowed: status != StatusCode::UNAUTHORIZED
                    && status != StatusCode::FORBIDDEN,
            });
        }

        let parsed: GenerateContentResponse = serde_json::from_str(&payload).map_err(|_| {
            SendAttemptError::non_retryable(
                LlmGatewayError::InvalidProviderPayload("response_json_parse_failed".to_string()),
                true,
            )
        })?;

        let text: String = parsed
            .candidates
            .first()
            .map(|candidate| {
                candidate
                    .content
                    .parts
                    .iter()
                    .filter_map(|part| part.text.as_deref())
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(SendAttemptError::non_retryable(
                LlmGatewayError::InvalidProviderPayload("empty_candidate_text".to_string()),
                true,
            ));
        }

        Ok(text)
    }

    async fn generate_with_fallback(
        &self,
        request: LlmGatewayRequest,
        mode: ResponseMode,
    ) -> Result<String, LlmGatewayError> {
        let candidate_models = self.config.model_route.candidate_models();

        for (index, model) in candidate_models.iter().enumerate() {
            match self.generate_for_model(model, &request, &mode).await {
                Ok(text) => return Ok(text),
                Err(model_err) => {
                    let has_more_candidates = index + 1 < candidate_models.len();
                    if has_more_candidates && model_err.fallback_allowed {
                        continue;
                    }
                    return Err(model_err.error);
                }
            }
        }

        Err(LlmGatewayError::ProviderFailure(
            "no_gemini_model_candidates".to_string(),
        ))
    }
}

impl LlmGateway for GeminiGateway {
    fn generate_json<'a>(&'a self, request: LlmGatewayRequest) -> LlmJsonFuture<'a> {
        Box::pin(async move {
            let text = self
                .generate_with_fallback(request, ResponseMode::Json)
                .await?;
            serde_json::from_str::<Value>(&text).map_err(|_| {
                LlmGatewayError::InvalidProviderPayload("content_not_json".to_string())
            })
        })
    }

    fn generate_text<'a>(
        &'a self,
        request: LlmGatewayRequest,
        web_search: bool,
    ) -> LlmTextFuture<'a> {
        Box::pin(async move {
            self.generate_with_fallback(request, ResponseMode::Text { web_search })
                .await
        })
    }
}

#[derive(Debug)]
struct SendAttemptError {
    error: LlmGatewayError,
    retryable: bool,
    fallback_allowed: bool,
}

impl SendAttemptError {
    fn retryable(error: LlmGatewayError, fallback_allowed: bool) -> Self {
        Self {
            error,
            retryable: true,
            fallback_allowed,
        }
    }

    fn non_retryable(error: LlmGatewayError, fallback_allowed: bool) -> Self {
        Self {
            error,
            retryable: false,
            fallback_allowed,
        }
    }
}

#[derive(Debug)]
struct ModelAttemptError {
    error: LlmGatewayError,
    fallback_allowed: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

fn is_retryable_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::REQUEST_TIMEOUT
            | StatusCode::TOO_MANY_REQUESTS
            | StatusCode::INTERNAL_SERVER_ERROR
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    )
}

fn require_non_empty_env(key: &str) -> Result<String, GeminiConfigError> {
    let value = env::var(key).map_err(|_| GeminiConfigError::MissingVar(key.to_string()))?;
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(GeminiConfigError::MissingVar(key.to_string()));
    }
    Ok(trimmed.to_string())
}

fn parse_u64_env(key: &str, default: u64) -> Result<u64, GeminiConfigError> {
    match optional_trimmed_env(key) {
        Some(value) => value
            .parse::<u64>()
            .map_err(|_| GeminiConfigError::ParseInt {
                key: key.to_string(),
                value,
            }),
        None => Ok(default),
    }
}

fn parse_u32_env(key: &str, default: u32) -> Result<u32, GeminiConfigError> {
    match optional_trimmed_env(key) {
        Some(value) => value
            .parse::<u32>()
            .map_err(|_| GeminiConfigError::ParseInt {
                key: key.to_string(),
                value,
            }),
        None => Ok(default),
    }
}

fn optional_trimmed_env(key: &str) -> Option<String> {
    env::var(key).ok().and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}
