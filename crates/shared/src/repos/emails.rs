use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::Row;
use uuid::Uuid;

use super::{
    AnalyzedEmailRecord, EmailAccountRecord, HistoricRunStats, NewAnalyzedEmail,
    SenderProfileUpsert, Store, StoreError,
};

impl Store {
    pub async fn upsert_email_account(
        &self,
        user_id: Uuid,
        email_address: &str,
        access_token: &str,
        refresh_token: Option<&str>,
        client_id: Option<&str>,
        client_secret: Option<&str>,
    ) -> Result<Uuid, StoreError> {
        let id: Uuid = sqlx::query_scalar(
            "INSERT INTO email_accounts
               (user_id, email_address, access_token, refresh_token, client_id, client_secret, active)
             VALUES ($1, $2, $3, $4, $5, $6, TRUE)
             ON CONFLICT (user_id, email_address)
             DO UPDATE SET
               access_token = EXCLUDED.access_token,
               refresh_token = COALESCE(EXCLUDED.refresh_token, email_accounts.refresh_token),
               client_id = COALESCE(EXCLUDED.client_id, email_accounts.client_id),
               client_secret = COALESCE(EXCLUDED.client_secret, email_accounts.client_secret),
               active = TRUE,
               updated_at = NOW()
             RETURNING id",
        )
        .bind(user_id)
        .bind(email_address)
        .bind(access_token)
        .bind(refresh_token)
        .bind(client_id)
        .bind(client_secret)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    pub async fn get_email_account(
        &self,
        user_id: Uuid,
        email_address: &str,
    ) -> Result<Option<EmailAccountRecord>, StoreError> {
        let row = sqlx::query(
            "SELECT id, user_id, email_address, access_token, refresh_token, client_id,
                    client_secret, active
             FROM email_accounts
             WHERE user_id = $1 AND email_address = $2",
        )
        .bind(user_id)
        .bind(email_address)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| {
            Ok(EmailAccountRecord {
                id: row.try_get("id")?,
                user_id: row.try_get("user_id")?,
                email_address: row.try_get("email_address")?,
                access_token: row.try_get("access_token")?,
                refresh_token: row.try_get("refresh_token")?,
                client_id: row.try_get("client_id")?,
                client_secret: row.try_get("client_secret")?,
                active: row.try_get("active")?,
            })
        })
        .transpose()
    }

    /// Dedupe step before layering: which of these gmail ids are already
    /// analyzed for this user.
    pub async fn existing_gmail_ids(
        &self,
        user_id: Uuid,
        gmail_message_ids: &[String],
    ) -> Result<HashSet<String>, StoreError> {
        if gmail_message_ids.is_empty() {
            return Ok(HashSet::new());
        }

        let rows = sqlx::query(
            "SELECT gmail_message_id
             FROM analyzed_emails
             WHERE user_id = $1 AND gmail_message_id = ANY($2)",
        )
        .bind(user_id)
        .bind(gmail_message_ids)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| Ok(row.try_get::<String, _>("gmail_message_id")?))
            .collect()
    }

    pub async fn insert_analyzed_email(
        &self,
        email: &NewAnalyzedEmail<'_>,
    ) -> Result<Uuid, StoreError> {
        let pending = serde_json::to_value(email.pending_actions)
            .map_err(|err| StoreError::InvalidData(format!("pending actions encode: {err}")))?;

        let id: Uuid = sqlx::query_scalar(
            "INSERT INTO analyzed_emails
               (user_id, email_account_id, gmail_message_id, remitente, asunto, fecha,
                score_importancia, categoria, urgencia, requiere_accion, respuesta_sugerida,
                tono_detectado, acciones_pendientes, fecha_limite, metadata)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
             ON CONFLICT (user_id, gmail_message_id) DO UPDATE SET updated_at = NOW()
             RETURNING id",
        )
        .bind(email.user_id)
        .bind(email.email_account_id)
        .bind(email.gmail_message_id)
        .bind(email.sender)
        .bind(email.subject)
        .bind(email.date)
        .bind(email.importance_score)
        .bind(email.category)
        .bind(email.urgency)
        .bind(email.requires_action)
        .bind(email.suggested_reply)
        .bind(email.detected_tone)
        .bind(pending)
        .bind(email.due_date)
        .bind(&email.metadata)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    /// Up to `limit` most recent analyzed emails from one sender, newest
    /// first, for the deep-analysis context.
    pub async fn sender_history(
        &self,
        user_id: Uuid,
        sender: &str,
        limit: i64,
    ) -> Result<Vec<AnalyzedEmailRecord>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, user_id, gmail_message_id, remitente, asunto, fecha, score_importancia,
                    categoria, urgencia, requiere_accion, respuesta_sugerida, tono_detectado,
                    acciones_pendientes, fecha_limite, leido, respondido, respondido_en, metadata
             FROM analyzed_emails
             WHERE user_id = $1 AND remitente = $2
             ORDER BY fecha DESC NULLS LAST
             LIMIT $3",
        )
        .bind(user_id)
        .bind(sender)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(analyzed_email_from_row).collect()
    }

    pub async fn list_analyzed_emails(
        &self,
        user_id: Uuid,
        only_pending: bool,
    ) -> Result<Vec<AnalyzedEmailRecord>, StoreError> {
        let rows = if only_pending {
            sqlx::query(
                "SELECT id, user_id, gmail_message_id, remitente, asunto, fecha, score_importancia,
                        categoria, urgencia, requiere_accion, respuesta_sugerida, tono_detectado,
                        acciones_pendientes, fecha_limite, leido, respondido, respondido_en, metadata
                 FROM analyzed_emails
                 WHERE user_id = $1 AND requiere_accion AND NOT leido AND NOT respondido
                 ORDER BY fecha DESC NULLS LAST",
            )
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?
        } else {
            sqlx::query(
                "SELECT id, user_id, gmail_message_id, remitente, asunto, fecha, score_importancia,
                        categoria, urgencia, requiere_accion, respuesta_sugerida, tono_detectado,
                        acciones_pendientes, fecha_limite, leido, respondido, respondido_en, metadata
                 FROM analyzed_emails
                 WHERE user_id = $1
                 ORDER BY fecha DESC NULLS LAST",
            )
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?
        };

        rows.into_iter().map(analyzed_email_from_row).collect()
    }

    pub async fn list_answered_emails(
        &self,
        user_id: Uuid,
        limit: i64,
    ) -> Result<Vec<AnalyzedEmailRecord>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, user_id, gmail_message_id, remitente, asunto, fecha, score_importancia,
                    categoria, urgencia, requiere_accion, respuesta_sugerida, tono_detectado,
                    acciones_pendientes, fecha_limite, leido, respondido, respondido_en, metadata
             FROM analyzed_emails
             WHERE user_id = $1 AND respondido
             ORDER BY respondido_en DESC NULLS LAST
             LIMIT $2",
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(analyzed_email_from_row).collect()
    }

    pub async fn mark_email_read(&self, email_id: Uuid, user_id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE analyzed_emails
             SET leido = TRUE, updated_at = NOW()
             WHERE id = $1 AND user_id = $2",
        )
        .bind(email_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn mark_email_answered(
        &self,
        email_id: Uuid,
        user_id: Uuid,
        answered_at: DateTime<Utc>,
        sent_reply: &str,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE analyzed_emails
             SET respondido = TRUE,
                 respondido_en = $3,
                 metadata = COALESCE(metadata, '{}'::jsonb)
                            || jsonb_build_object('respuesta_enviada', $4::text),
                 updated_at = NOW()
             WHERE id = $1 AND user_id = $2",
        )
        .bind(email_id)
        .bind(user_id)
        .bind(answered_at)
        .bind(sent_reply)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn revert_email_answered(
        &self,
        email_id: Uuid,
        user_id: Uuid,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE analyzed_emails
             SET respondido = FALSE, respondido_en = NULL, updated_at = NOW()
             WHERE id = $1 AND user_id = $2",
        )
        .bind(email_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn upsert_sender_profile(
        &self,
        profile: &SenderProfileUpsert<'_>,
    ) -> Result<(), StoreError> {
        let keywords = serde_json::to_value(profile.top_keywords)
            .map_err(|err| StoreError::InvalidData(format!("keywords encode: {err}")))?;

        sqlx::query(
            "INSERT INTO sender_profiles
               (user_id, email_account_id, remitente, total_emails, primer_contacto,
                ultimo_contacto, frecuencia_dias, hora_comun, longitud_promedio,
                palabras_clave, tono_habitual, tema_principal, nivel_importancia,
                patron_comunicacion)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
             ON CONFLICT (user_id, remitente)
             DO UPDATE SET
               total_emails = EXCLUDED.total_emails,
               primer_contacto = EXCLUDED.primer_contacto,
               ultimo_contacto = EXCLUDED.ultimo_contacto,
               frecuencia_dias = EXCLUDED.frecuencia_dias,
               hora_comun = EXCLUDED.hora_comun,
               longitud_promedio = EXCLUDED.longitud_promedio,
               palabras_clave = EXCLUDED.palabras_clave,
               tono_habitual = EXCLUDED.tono_habitual,
               tema_principal = EXCLUDED.tema_principal,
               nivel_importancia = EXCLUDED.nivel_importancia,
               patron_comunicacion = EXCLUDED.patron_comunicacion,
               updated_at = NOW()",
        )
        .bind(profile.user_id)
        .bind(profile.email_account_id)
        .bind(profile.sender)
        .bind(profile.total_emails)
        .bind(profile.first_contact)
        .bind(profile.last_contact)
        .bind(profile.frequency_days)
        .bind(profile.typical_hour)
        .bind(profile.avg_length)
        .bind(keywords)
        .bind(profile.habitual_tone)
        .bind(profile.primary_topic)
        .bind(profile.importance_level)
        .bind(profile.communication_pattern)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// The historic pass runs once per (user, mailbox).
    pub async fn historic_run_completed(
        &self,
        user_id: Uuid,
        email_address: &str,
    ) -> Result<bool, StoreError> {
        let completed: Option<bool> = sqlx::query_scalar(
            "SELECT completado
             FROM gmail_history_runs
             WHERE user_id = $1 AND email_gmail = $2",
        )
        .bind(user_id)
        .bind(email_address)
        .fetch_optional(&self.pool)
        .await?;
        Ok(completed.unwrap_or(false))
    }

    pub async fn record_historic_run(
        &self,
        user_id: Uuid,
        email_address: &str,
        stats: &HistoricRunStats,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO gmail_history_runs
               (user_id, email_gmail, total_correos, correos_descartados, correos_valor,
                remitentes_aprendidos, llamadas_ia, ahorro_porcentaje, completado)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, TRUE)
             ON CONFLICT (user_id, email_gmail)
             DO UPDATE SET
               total_correos = EXCLUDED.total_correos,
               correos_descartados = EXCLUDED.correos_descartados,
               correos_valor = EXCLUDED.correos_valor,
               remitentes_aprendidos = EXCLUDED.remitentes_aprendidos,
               llamadas_ia = EXCLUDED.llamadas_ia,
               ahorro_porcentaje = EXCLUDED.ahorro_porcentaje,
               completado = TRUE,
               updated_at = NOW()",
        )
        .bind(user_id)
        .bind(email_address)
        .bind(stats.total_emails)
        .bind(stats.discarded)
        .bind(stats.valuable)
        .bind(stats.senders_learned)
        .bind(stats.llm_calls)
        .bind(stats.savings_percent)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

fn analyzed_email_from_row(row: sqlx::postgres::PgRow) -> Result<AnalyzedEmailRecord, StoreError> {
    let pending: Option<Value> = row.try_get("acciones_pendientes")?;
    let pending_actions = pending
        .and_then(|value| serde_json::from_value::<Vec<String>>(value).ok())
        .unwrap_or_default();
    let metadata: Option<Value> = row.try_get("metadata")?;

    Ok(AnalyzedEmailRecord {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        gmail_message_id: row.try_get("gmail_message_id")?,
        sender: row.try_get("remitente")?,
        subject: row.try_get("asunto")?,
        date: row.try_get("fecha")?,
        importance_score: row.try_get("score_importancia")?,
        category: row.try_get("categoria")?,
        urgency: row.try_get("urgencia")?,
        requires_action: row.try_get("requiere_accion")?,
        suggested_reply: row.try_get("respuesta_sugerida")?,
        detected_tone: row.try_get("tono_detectado")?,
        pending_actions,
        due_date: row.try_get("fecha_limite")?,
        read: row.try_get("leido")?,
        answered: row.try_get("respondido")?,
        answered_at: row.try_get("respondido_en")?,
        metadata: metadata.unwrap_or(Value::Null),
    })
}
