use sqlx::{QueryBuilder, Row};
use uuid::Uuid;

use crate::models::WhatsAppMessageUpload;

use super::{ChatMemoryRecord, Store, StoreError, WhatsAppMessageRecord, WhatsAppStats};

impl Store {
    /// Bulk upsert keyed on the device-provided message id. Re-uploading the
    /// same batch is a no-op apart from `updated_at`.
    pub async fn upsert_whatsapp_messages(
        &self,
        user_id: Uuid,
        device_id: Option<&str>,
        messages: &[WhatsAppMessageUpload],
    ) -> Result<usize, StoreError> {
        if messages.is_empty() {
            return Ok(0);
        }

        let mut builder = QueryBuilder::new(
            "INSERT INTO whatsapp_messages
               (id, user_id, chat_id, chat_nombre, contenido, ts, es_mio, tipo, device_id, synced, metadata) ",
        );
        builder.push_values(messages, |mut row, message| {
            row.push_bind(&message.id)
                .push_bind(user_id)
                .push_bind(&message.chat_id)
                .push_bind(&message.chat_nombre)
                .push_bind(&message.contenido)
                .push_bind(message.timestamp)
                .push_bind(message.es_mio)
                .push_bind(&message.tipo)
                .push_bind(device_id)
                .push_bind(true)
                .push_bind(&message.metadata);
        });
        builder.push(
            " ON CONFLICT (id) DO UPDATE SET
               contenido = EXCLUDED.contenido,
               ts = EXCLUDED.ts,
               tipo = EXCLUDED.tipo,
               metadata = EXCLUDED.metadata,
               synced = TRUE,
               updated_at = NOW()",
        );

        let result = builder.build().execute(&self.pool).await?;
        Ok(result.rows_affected() as usize)
    }

    /// The brain pass claims exactly the rows still unprocessed, ordered by
    /// chat then timestamp so grouping is a single linear scan.
    pub async fn unprocessed_whatsapp_messages(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<WhatsAppMessageRecord>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, user_id, chat_id, chat_nombre, contenido, ts, es_mio, tipo, device_id,
                    processed_by_ai
             FROM whatsapp_messages
             WHERE user_id = $1 AND NOT processed_by_ai
             ORDER BY chat_nombre ASC, ts ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(WhatsAppMessageRecord {
                    id: row.try_get("id")?,
                    user_id: row.try_get("user_id")?,
                    chat_id: row.try_get("chat_id")?,
                    chat_name: row.try_get("chat_nombre")?,
                    content: row.try_get("contenido")?,
                    ts: row.try_get("ts")?,
                    is_mine: row.try_get("es_mio")?,
                    kind: row.try_get("tipo")?,
                    device_id: row.try_get("device_id")?,
                    processed_by_ai: row.try_get("processed_by_ai")?,
                })
            })
            .collect()
    }

    /// One statement flips the whole processed set; this is what makes two
    /// concurrent brain passes safe without a per-chat lock.
    pub async fn mark_whatsapp_processed(
        &self,
        user_id: Uuid,
        message_ids: &[String],
    ) -> Result<u64, StoreError> {
        if message_ids.is_empty() {
            return Ok(0);
        }

        let result = sqlx::query(
            "UPDATE whatsapp_messages
             SET processed_by_ai = TRUE, updated_at = NOW()
             WHERE user_id = $1 AND id = ANY($2)",
        )
        .bind(user_id)
        .bind(message_ids)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Transcription completion rewrites the content and re-opens the row for
    /// the next brain pass.
    pub async fn apply_whatsapp_transcription(
        &self,
        user_id: Uuid,
        message_id: &str,
        content: &str,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE whatsapp_messages
             SET contenido = $3, processed_by_ai = FALSE, updated_at = NOW()
             WHERE user_id = $1 AND id = $2",
        )
        .bind(user_id)
        .bind(message_id)
        .bind(content)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn get_chat_memory(
        &self,
        user_id: Uuid,
        chat_name: &str,
    ) -> Result<Option<ChatMemoryRecord>, StoreError> {
        let row = sqlx::query(
            "SELECT chat_nombre, resumen_actual, temas_abiertos, last_updated
             FROM chat_memories
             WHERE user_id = $1 AND chat_nombre = $2",
        )
        .bind(user_id)
        .bind(chat_name)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| {
            Ok(ChatMemoryRecord {
                chat_name: row.try_get("chat_nombre")?,
                current_summary: row.try_get("resumen_actual")?,
                open_topics: row.try_get("temas_abiertos")?,
                last_updated: row.try_get("last_updated")?,
            })
        })
        .transpose()
    }

    /// Last-writer-wins by design; see the concurrency notes in the brain.
    pub async fn upsert_chat_memory(
        &self,
        user_id: Uuid,
        chat_name: &str,
        summary: &str,
        open_topics: Option<&str>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO chat_memories (user_id, chat_nombre, resumen_actual, temas_abiertos, last_updated)
             VALUES ($1, $2, $3, $4, NOW())
             ON CONFLICT (user_id, chat_nombre)
             DO UPDATE SET
               resumen_actual = EXCLUDED.resumen_actual,
               temas_abiertos = EXCLUDED.temas_abiertos,
               last_updated = NOW()",
        )
        .bind(user_id)
        .bind(chat_name)
        .bind(summary)
        .bind(open_topics)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn whatsapp_stats(&self, user_id: Uuid) -> Result<WhatsAppStats, StoreError> {
        let row = sqlx::query(
            "SELECT
               (SELECT COUNT(*) FROM whatsapp_messages WHERE user_id = $1) AS total_messages,
               (SELECT COUNT(*) FROM whatsapp_messages WHERE user_id = $1 AND NOT processed_by_ai) AS unprocessed,
               (SELECT COUNT(DISTINCT chat_nombre) FROM whatsapp_messages WHERE user_id = $1) AS chats,
               (SELECT COUNT(*) FROM alerts WHERE user_id = $1 AND estado = 'pendiente') AS active_alerts",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(WhatsAppStats {
            total_messages: row.try_get("total_messages")?,
            unprocessed: row.try_get("unprocessed")?,
            chats: row.try_get("chats")?,
            active_alerts: row.try_get("active_alerts")?,
        })
    }
}
