use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::Row;
use uuid::Uuid;

use crate::models::{AlertKind, AlertLabel, AlertState, Priority};

use super::{AlertRecord, NewAlert, Store, StoreError};

/// Completed alerts disappear from the default listing after 14 days.
const COMPLETED_VISIBILITY_DAYS: i32 = 14;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertListFilter {
    Pending,
    Completed,
    All,
}

impl Store {
    pub async fn insert_alert(&self, alert: &NewAlert<'_>) -> Result<AlertRecord, StoreError> {
        let row = sqlx::query(
            "INSERT INTO alerts
               (user_id, conversation_id, titulo, descripcion, prioridad, tipo, estado, etiqueta, fecha_alerta, metadata)
             VALUES ($1, $2, $3, $4, $5, $6, 'pendiente', $7, $8, $9)
             RETURNING id, user_id, conversation_id, titulo, descripcion, prioridad, tipo,
                       estado, etiqueta, fecha_alerta, metadata, archived_at, created_at",
        )
        .bind(alert.user_id)
        .bind(alert.conversation_id)
        .bind(alert.titulo)
        .bind(alert.descripcion)
        .bind(alert.priority.as_str())
        .bind(alert.kind.as_str())
        .bind(alert.label.as_str())
        .bind(alert.due_at)
        .bind(&alert.metadata)
        .fetch_one(&self.pool)
        .await?;

        alert_from_row(row)
    }

    /// Re-read after insert: a DB-side trigger may have rewritten parts of
    /// the metadata (e.g. the meet link).
    pub async fn alert_metadata(
        &self,
        alert_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Value>, StoreError> {
        let row = sqlx::query(
            "SELECT metadata FROM alerts WHERE id = $1 AND user_id = $2",
        )
        .bind(alert_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| Ok(row.try_get::<Option<Value>, _>("metadata")?.unwrap_or(Value::Null)))
            .transpose()
    }

    pub async fn list_alerts(
        &self,
        user_id: Uuid,
        filter: AlertListFilter,
    ) -> Result<Vec<AlertRecord>, StoreError> {
        let rows = match filter {
            AlertListFilter::Pending => {
                sqlx::query(
                    "SELECT id, user_id, conversation_id, titulo, descripcion, prioridad, tipo,
                            estado, etiqueta, fecha_alerta, metadata, archived_at, created_at
                     FROM alerts
                     WHERE user_id = $1 AND estado = 'pendiente'
                     ORDER BY fecha_alerta ASC NULLS LAST, created_at DESC",
                )
                .bind(user_id)
                .fetch_all(&self.pool)
                .await?
            }
            AlertListFilter::Completed => {
                sqlx::query(
                    "SELECT id, user_id, conversation_id, titulo, descripcion, prioridad, tipo,
                            estado, etiqueta, fecha_alerta, metadata, archived_at, created_at
                     FROM alerts
                     WHERE user_id = $1
                       AND estado = 'completada'
                       AND archived_at IS NULL
                       AND created_at > NOW() - make_interval(days => $2)
                     ORDER BY created_at DESC",
                )
                .bind(user_id)
                .bind(COMPLETED_VISIBILITY_DAYS)
                .fetch_all(&self.pool)
                .await?
            }
            AlertListFilter::All => {
                sqlx::query(
                    "SELECT id, user_id, conversation_id, titulo, descripcion, prioridad, tipo,
                            estado, etiqueta, fecha_alerta, metadata, archived_at, created_at
                     FROM alerts
                     WHERE user_id = $1
                     ORDER BY created_at DESC",
                )
                .bind(user_id)
                .fetch_all(&self.pool)
                .await?
            }
        };

        rows.into_iter().map(alert_from_row).collect()
    }

    pub async fn priority_alerts(
        &self,
        user_id: Uuid,
        limit: i64,
    ) -> Result<Vec<AlertRecord>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, user_id, conversation_id, titulo, descripcion, prioridad, tipo,
                    estado, etiqueta, fecha_alerta, metadata, archived_at, created_at
             FROM alerts
             WHERE user_id = $1 AND estado = 'pendiente'
             ORDER BY (prioridad = 'HIGH') DESC,
                      (prioridad = 'MEDIUM') DESC,
                      fecha_alerta ASC NULLS LAST
             LIMIT $2",
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(alert_from_row).collect()
    }

    /// Pending alerts due up to `until`, for the briefing scheduler.
    pub async fn due_pending_alerts(
        &self,
        user_id: Uuid,
        until: DateTime<Utc>,
    ) -> Result<Vec<AlertRecord>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, user_id, conversation_id, titulo, descripcion, prioridad, tipo,
                    estado, etiqueta, fecha_alerta, metadata, archived_at, created_at
             FROM alerts
             WHERE user_id = $1
               AND estado = 'pendiente'
               AND fecha_alerta IS NOT NULL
               AND fecha_alerta <= $2
             ORDER BY fecha_alerta ASC",
        )
        .bind(user_id)
        .bind(until)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(alert_from_row).collect()
    }

    /// Most recent alerts regardless of state, for deep-mode Consulta.
    pub async fn recent_alerts(
        &self,
        user_id: Uuid,
        limit: i64,
    ) -> Result<Vec<AlertRecord>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, user_id, conversation_id, titulo, descripcion, prioridad, tipo,
                    estado, etiqueta, fecha_alerta, metadata, archived_at, created_at
             FROM alerts
             WHERE user_id = $1
             ORDER BY created_at DESC
             LIMIT $2",
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(alert_from_row).collect()
    }

    pub async fn alert_owner(&self, alert_id: Uuid) -> Result<Option<Uuid>, StoreError> {
        let owner: Option<Uuid> =
            sqlx::query_scalar("SELECT user_id FROM alerts WHERE id = $1")
                .bind(alert_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(owner)
    }

    pub async fn update_alert_state(
        &self,
        alert_id: Uuid,
        user_id: Uuid,
        state: AlertState,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE alerts
             SET estado = $3, updated_at = NOW()
             WHERE id = $1 AND user_id = $2",
        )
        .bind(alert_id)
        .bind(user_id)
        .bind(state.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn update_alert_label(
        &self,
        alert_id: Uuid,
        user_id: Uuid,
        label: AlertLabel,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE alerts
             SET etiqueta = $3, updated_at = NOW()
             WHERE id = $1 AND user_id = $2",
        )
        .bind(alert_id)
        .bind(user_id)
        .bind(label.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn update_alert_metadata(
        &self,
        alert_id: Uuid,
        user_id: Uuid,
        metadata: &Value,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE alerts
             SET metadata = $3, updated_at = NOW()
             WHERE id = $1 AND user_id = $2",
        )
        .bind(alert_id)
        .bind(user_id)
        .bind(metadata)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

fn alert_from_row(row: sqlx::postgres::PgRow) -> Result<AlertRecord, StoreError> {
    let prioridad: String = row.try_get("prioridad")?;
    let tipo: String = row.try_get("tipo")?;
    let estado: String = row.try_get("estado")?;
    let etiqueta: String = row.try_get("etiqueta")?;
    let metadata: Option<Value> = row.try_get("metadata")?;

    Ok(AlertRecord {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        conversation_id: row.try_get("conversation_id")?,
        titulo: row.try_get("titulo")?,
        descripcion: row.try_get("descripcion")?,
        priority: Priority::from_db(&prioridad).ok_or_else(|| {
            StoreError::InvalidData(format!("unknown alert priority persisted: {prioridad}"))
        })?,
        kind: AlertKind::from_db(&tipo).ok_or_else(|| {
            StoreError::InvalidData(format!("unknown alert kind persisted: {tipo}"))
        })?,
        state: AlertState::from_db(&estado).ok_or_else(|| {
            StoreError::InvalidData(format!("unknown alert state persisted: {estado}"))
        })?,
        label: AlertLabel::from_db(&etiqueta).ok_or_else(|| {
            StoreError::InvalidData(format!("unknown alert label persisted: {etiqueta}"))
        })?,
        due_at: row.try_get("fecha_alerta")?,
        metadata: metadata.unwrap_or(Value::Null),
        archived_at: row.try_get("archived_at")?,
        created_at: row.try_get("created_at")?,
    })
}
