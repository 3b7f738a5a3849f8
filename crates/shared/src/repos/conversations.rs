use serde_json::Value;
use sqlx::Row;
use uuid::Uuid;

use crate::models::{ConversationType, Priority};

use super::{ConversationRecord, NewConversation, SemanticMatch, Store, StoreError};

impl Store {
    pub async fn insert_conversation(
        &self,
        conversation: &NewConversation<'_>,
    ) -> Result<Uuid, StoreError> {
        let id: Uuid = sqlx::query_scalar(
            "INSERT INTO conversations (user_id, resumen, tipo, urgencia, origen, metadata)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING id",
        )
        .bind(conversation.user_id)
        .bind(conversation.resumen)
        .bind(conversation.tipo.as_str())
        .bind(conversation.urgencia.as_str())
        .bind(conversation.origen.as_str())
        .bind(&conversation.metadata)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    pub async fn recent_conversations(
        &self,
        user_id: Uuid,
        limit: i64,
    ) -> Result<Vec<ConversationRecord>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, user_id, resumen, tipo, urgencia, origen, metadata, created_at
             FROM conversations
             WHERE user_id = $1
             ORDER BY created_at DESC
             LIMIT $2",
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(conversation_from_row).collect()
    }

    /// Embeddings are optional; a row without one simply never matches.
    pub async fn attach_conversation_embedding(
        &self,
        conversation_id: Uuid,
        user_id: Uuid,
        embedding: &[f32],
    ) -> Result<(), StoreError> {
        let encoded = serde_json::to_value(embedding)
            .map_err(|err| StoreError::InvalidData(format!("embedding encode failed: {err}")))?;

        sqlx::query(
            "UPDATE conversations
             SET embedding = $3
             WHERE id = $1 AND user_id = $2",
        )
        .bind(conversation_id)
        .bind(user_id)
        .bind(encoded)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Similarity search over the per-user index, delegated to the store's
    /// `match_conversations` SQL function.
    pub async fn semantic_matches(
        &self,
        user_id: Uuid,
        embedding: &[f32],
        threshold: f64,
        top_k: i64,
    ) -> Result<Vec<SemanticMatch>, StoreError> {
        let encoded = serde_json::to_value(embedding)
            .map_err(|err| StoreError::InvalidData(format!("embedding encode failed: {err}")))?;

        let rows = sqlx::query(
            "SELECT resumen, similitud
             FROM match_conversations($1, $2::jsonb, $3, $4)",
        )
        .bind(user_id)
        .bind(encoded)
        .bind(threshold)
        .bind(top_k)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(SemanticMatch {
                    resumen: row.try_get("resumen")?,
                    similitud: row.try_get("similitud")?,
                })
            })
            .collect()
    }
}

fn conversation_from_row(row: sqlx::postgres::PgRow) -> Result<ConversationRecord, StoreError> {
    let tipo: String = row.try_get("tipo")?;
    let urgencia: String = row.try_get("urgencia")?;
    let metadata: Option<Value> = row.try_get("metadata")?;

    Ok(ConversationRecord {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        resumen: row.try_get("resumen")?,
        tipo: ConversationType::from_db(&tipo).ok_or_else(|| {
            StoreError::InvalidData(format!("unknown conversation type persisted: {tipo}"))
        })?,
        urgencia: Priority::from_db(&urgencia).ok_or_else(|| {
            StoreError::InvalidData(format!("unknown urgency persisted: {urgencia}"))
        })?,
        origen: row.try_get("origen")?,
        metadata: metadata.unwrap_or(Value::Null),
        created_at: row.try_get("created_at")?,
    })
}
