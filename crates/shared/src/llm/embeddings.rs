use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde::Deserialize;
use serde_json::json;

use super::gateway::LlmGatewayError;

pub type EmbedderFuture<'a> =
    Pin<Box<dyn Future<Output = Result<Vec<f32>, LlmGatewayError>> + Send + 'a>>;

/// Embedding client. Best-effort across the codebase: callers treat every
/// failure as "no embedding", never as a request failure.
pub trait Embedder: Send + Sync {
    fn embed<'a>(&'a self, text: &'a str) -> EmbedderFuture<'a>;
}

const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-004";
const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_TIMEOUT_MS: u64 = 10_000;

#[derive(Clone)]
pub struct GeminiEmbedder {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl GeminiEmbedder {
    pub fn new(api_key: String) -> Result<Self, LlmGatewayError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(DEFAULT_TIMEOUT_MS))
            .build()
            .map_err(|err| LlmGatewayError::ProviderFailure(err.to_string()))?;

        Ok(Self {
            client,
            base_url: std::env::var("GEMINI_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
            api_key,
            model: std::env::var("GEMINI_EMBEDDING_MODEL")
                .unwrap_or_else(|_| DEFAULT_EMBEDDING_MODEL.to_string()),
        })
    }
}

#[derive(Debug, Deserialize)]
struct EmbedContentResponse {
    embedding: EmbeddingValues,
}

#[derive(Debug, Deserialize)]
struct EmbeddingValues {
    values: Vec<f32>,
}

impl Embedder for GeminiEmbedder {
    fn embed<'a>(&'a self, text: &'a str) -> EmbedderFuture<'a> {
        Box::pin(async move {
            let url = format!(
                "{}/models/{}:embedContent?key={}",
                self.base_url, self.model, self.api_key
            );
            let body = json!({
                "content": { "parts": [{ "text": text }] }
            });

            let response = self
                .client
                .post(&url)
                .json(&body)
                .send()
                .await
                .map_err(|err| {
                    if err.is_timeout() {
                        LlmGatewayError::Timeout
                    } else {
                        LlmGatewayError::ProviderFailure("embed_request_unavailable".to_string())
                    }
                })?;

            let status = response.status();
            if !status.is_success() {
                return Err(LlmGatewayError::ProviderFailure(format!(
                    "embed status={}",
                    status.as_u16()
                )));
            }

            let parsed: EmbedContentResponse = response.json().await.map_err(|_| {
                LlmGatewayError::InvalidProviderPayload("embed_response_invalid".to_string())
            })?;

            if parsed.embedding.values.is_empty() {
                return Err(LlmGatewayError::InvalidProviderPayload(
                    "embed_response_empty".to_string(),
                ));
            }

            Ok(parsed.embedding.values)
        })
    }
}
