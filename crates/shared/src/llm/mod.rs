pub mod contracts;
pub mod embeddings;
pub mod gateway;
pub mod gemini;
pub mod prompts;

pub use contracts::{
    BrainContract, BrainTaskContract, EmailClassifyContract, EmailDeepContract, IntentContract,
    IntentKind, SenderProfileContract, SubActionContract, ValueContract, ValueTaskContract,
};
pub use embeddings::{Embedder, EmbedderFuture, GeminiEmbedder};
pub use gateway::{
    LlmCapability, LlmGateway, LlmGatewayError, LlmGatewayRequest, LlmJsonFuture, LlmTextFuture,
};
pub use gemini::{GeminiGateway, GeminiGatewayConfig, GeminiModelRoute};
