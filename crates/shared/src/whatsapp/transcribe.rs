use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::{info, warn};
use uuid::Uuid;

use crate::repos::Store;

const TRANSCRIPT_PREFIX: &str = "[AUDIO TRANSCRITO] ";
const DEFAULT_TIMEOUT_MS: u64 = 120_000;

#[derive(Debug, Error)]
pub enum TranscribeError {
    #[error("audio file read failed: {0}")]
    File(String),
    #[error("stt request failed: {0}")]
    Request(String),
    #[error("stt responded with status {0}")]
    Status(u16),
    #[error("stt payload was invalid")]
    InvalidPayload,
}

pub type TranscriberFuture<'a> =
    Pin<Box<dyn Future<Output = Result<String, TranscribeError>> + Send + 'a>>;

/// Speech-to-text collaborator. Lazily initialised on first use and shared
/// across requests.
pub trait Transcriber: Send + Sync {
    fn transcribe<'a>(&'a self, audio_path: &'a Path) -> TranscriberFuture<'a>;
}

/// OpenAI-compatible `/audio/transcriptions` endpoint client.
pub struct HttpTranscriber {
    base_url: String,
    api_key: Option<String>,
    client: OnceCell<reqwest::Client>,
}

impl HttpTranscriber {
    pub fn new(base_url: String, api_key: Option<String>) -> Self {
        Self {
            base_url,
            api_key,
            client: OnceCell::new(),
        }
    }

    async fn client(&self) -> Result<&reqwest::Client, TranscribeError> {
        self.client
            .get_or_try_init(|| async {
                reqwest::Client::builder()
                    .timeout(Duration::from_millis(DEFAULT_TIMEOUT_MS))
                    .build()
                    .map_err(|err| TranscribeError::Request(err.to_string()))
            })
            .await
    }
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
}

impl Transcriber for HttpTranscriber {
    fn transcribe<'a>(&'a self, audio_path: &'a Path) -> TranscriberFuture<'a> {
        Box::pin(async move {
            let bytes = tokio::fs::read(audio_path)
                .await
                .map_err(|err| TranscribeError::File(err.to_string()))?;

            let file_name = audio_path
                .file_name()
                .and_then(|name| name.to_str())
                .unwrap_or("audio.ogg")
                .to_string();

            let part = reqwest::multipart::Part::bytes(bytes).file_name(file_name);
            let form = reqwest::multipart::Form::new()
                .part("file", part)
                .text("model", "whisper-1")
                .text("language", "es");

            let mut request = self
                .client()
                .await?
                .post(format!("{}/audio/transcriptions", self.base_url))
                .multipart(form);
            if let Some(api_key) = &self.api_key {
                request = request.bearer_auth(api_key);
            }

            let response = request
                .send()
                .await
                .map_err(|err| TranscribeError::Request(err.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                return Err(TranscribeError::Status(status.as_u16()));
            }

            let parsed: TranscriptionResponse = response
                .json()
                .await
                .map_err(|_| TranscribeError::InvalidPayload)?;
            Ok(parsed.text)
        })
    }
}

/// Fire-and-forget background transcription. On completion the message
/// content is rewritten with the transcript prefix and the row re-opens for
/// the next brain pass. The temp file is removed on every exit path.
pub fn queue_transcription(
    store: Store,
    transcriber: Arc<dyn Transcriber>,
    user_id: Uuid,
    message_id: String,
    chat_name: String,
    audio_path: PathBuf,
) {
    tokio::spawn(async move {
        let result = transcriber.transcribe(&audio_path).await;

        if let Err(err) = tokio::fs::remove_file(&audio_path).await {
            warn!("temp audio cleanup failed for {}: {err}", audio_path.display());
        }

        let transcript = match result {
            Ok(text) => text,
            Err(err) => {
                warn!("transcription failed for message {message_id} ({chat_name}): {err}");
                return;
            }
        };

        let content = format!("{TRANSCRIPT_PREFIX}{transcript}");
        match store
            .apply_whatsapp_transcription(user_id, &message_id, &content)
            .await
        {
            Ok(true) => info!("transcription stored for message {message_id} ({chat_name})"),
            Ok(false) => warn!("transcribed message {message_id} no longer exists"),
            Err(err) => warn!("transcription store failed for {message_id}: {err}"),
        }
    });
}

#[cfg(test)]
mod tests {
    use super::TRANSCRIPT_PREFIX;

    #[test]
    fn transcript_prefix_matches_wire_format() {
        assert_eq!(TRANSCRIPT_PREFIX, "[AUDIO TRANSCRITO] ");
    }
}
