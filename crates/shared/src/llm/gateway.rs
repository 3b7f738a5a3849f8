use std::future::Future;
use std::pin::Pin;

use serde_json::Value;
use thiserror::Error;

pub type LlmJsonFuture<'a> =
    Pin<Box<dyn Future<Output = Result<Value, LlmGatewayError>> + Send + 'a>>;
pub type LlmTextFuture<'a> =
    Pin<Box<dyn Future<Output = Result<String, LlmGatewayError>> + Send + 'a>>;

/// Which pipeline step is calling. Used for logging and model routing only;
/// every capability has a deterministic fallback at its call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmCapability {
    IntentGate,
    TaskExtraction,
    ValueExtraction,
    Consulta,
    EmailClassify,
    EmailDeepAnalysis,
    SenderProfile,
    ChatBrain,
}

impl LlmCapability {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::IntentGate => "intent_gate",
            Self::TaskExtraction => "task_extraction",
            Self::ValueExtraction => "value_extraction",
            Self::Consulta => "consulta",
            Self::EmailClassify => "email_classify",
            Self::EmailDeepAnalysis => "email_deep_analysis",
            Self::SenderProfile => "sender_profile",
            Self::ChatBrain => "chat_brain",
        }
    }
}

#[derive(Debug, Clone)]
pub struct LlmGatewayRequest {
    pub capability: LlmCapability,
    pub system_prompt: String,
    pub user_prompt: String,
}

#[derive(Debug, Error)]
pub enum LlmGatewayError {
    #[error("llm provider request timed out")]
    Timeout,
    #[error("llm provider request failed: {0}")]
    ProviderFailure(String),
    #[error("llm provider returned an invalid payload: {0}")]
    InvalidProviderPayload(String),
}

/// Process-wide LLM client. `generate_json` forces a JSON response body;
/// `generate_text` returns prose and may let the provider use its web-search
/// tool.
pub trait LlmGateway: Send + Sync {
    fn generate_json<'a>(&'a self, request: LlmGatewayRequest) -> LlmJsonFuture<'a>;
    fn generate_text<'a>(&'a self, request: LlmGatewayRequest, web_search: bool)
    -> LlmTextFuture<'a>;
}
