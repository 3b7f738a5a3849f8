use tracing::debug;
use uuid::Uuid;

use crate::llm::Embedder;
use crate::repos::Store;

const SIMILARITY_THRESHOLD: f64 = 0.6;
const TOP_K: i64 = 3;

/// Best-effort embedding attach for a freshly inserted conversation. Failures
/// leave the row without an embedding, which the recall side tolerates.
pub async fn embed_and_attach(
    store: &Store,
    embedder: &dyn Embedder,
    conversation_id: Uuid,
    user_id: Uuid,
    text: &str,
) {
    let embedding = match embedder.embed(text).await {
        Ok(values) => values,
        Err(err) => {
            debug!("conversation embedding skipped: {err}");
            return;
        }
    };

    if let Err(err) = store
        .attach_conversation_embedding(conversation_id, user_id, &embedding)
        .await
    {
        debug!("conversation embedding attach failed: {err}");
    }
}

/// Similarity recall over the user's conversation summaries. Returns an empty
/// string on any failure so Consulta degrades to non-semantic mode.
pub async fn recall(store: &Store, embedder: &dyn Embedder, user_id: Uuid, query: &str) -> String {
    let embedding = match embedder.embed(query).await {
        Ok(values) => values,
        Err(err) => {
            debug!("semantic recall embed failed: {err}");
            return String::new();
        }
    };

    let matches = match store
        .semantic_matches(user_id, &embedding, SIMILARITY_THRESHOLD, TOP_K)
        .await
    {
        Ok(matches) => matches,
        Err(err) => {
            debug!("semantic recall query failed: {err}");
            return String::new();
        }
    };

    matches
        .into_iter()
        .map(|found| format!("- {}", found.resumen))
        .collect::<Vec<_>>()
        .join("\n")
}
