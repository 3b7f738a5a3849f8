use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{AlertKind, AlertLabel, AlertState, ConversationType, Origin, Priority};

mod alerts;
mod conversations;
mod emails;
mod facts;
mod users;
mod whatsapp;

pub use alerts::AlertListFilter;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("invalid persisted data: {0}")]
    InvalidData(String),
}

impl StoreError {
    /// A foreign-key violation on insert, e.g. an alert pointing at a user
    /// row that does not exist yet.
    pub fn is_foreign_key_violation(&self) -> bool {
        matches!(
            self,
            Self::Database(sqlx::Error::Database(db)) if db.code().as_deref() == Some("23503")
        )
    }
}

#[derive(Clone)]
pub struct Store {
    pool: PgPool,
}

impl Store {
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn ping(&self) -> Result<(), StoreError> {
        let _: i32 = sqlx::query_scalar("SELECT 1").fetch_one(&self.pool).await?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct UserRecord {
    pub id: Uuid,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub push_token: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewConversation<'a> {
    pub user_id: Uuid,
    pub resumen: &'a str,
    pub tipo: ConversationType,
    pub urgencia: Priority,
    pub origen: Origin,
    pub metadata: Value,
}

#[derive(Debug, Clone)]
pub struct ConversationRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub resumen: String,
    pub tipo: ConversationType,
    pub urgencia: Priority,
    pub origen: String,
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct SemanticMatch {
    pub resumen: String,
    pub similitud: f64,
}

#[derive(Debug, Clone)]
pub struct ProfileFactRecord {
    pub fact_text: String,
    pub category: String,
    pub origin_ref: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewAlert<'a> {
    pub user_id: Uuid,
    pub conversation_id: Option<Uuid>,
    pub titulo: &'a str,
    pub descripcion: &'a str,
    pub priority: Priority,
    pub kind: AlertKind,
    pub label: AlertLabel,
    pub due_at: Option<DateTime<Utc>>,
    pub metadata: Value,
}

#[derive(Debug, Clone)]
pub struct AlertRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub conversation_id: Option<Uuid>,
    pub titulo: String,
    pub descripcion: String,
    pub priority: Priority,
    pub kind: AlertKind,
    pub state: AlertState,
    pub label: AlertLabel,
    pub due_at: Option<DateTime<Utc>>,
    pub metadata: Value,
    pub archived_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct EmailAccountRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub email_address: String,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub active: bool,
}

#[derive(Debug, Clone)]
pub struct NewAnalyzedEmail<'a> {
    pub user_id: Uuid,
    pub email_account_id: Option<Uuid>,
    pub gmail_message_id: &'a str,
    pub sender: &'a str,
    pub subject: &'a str,
    pub date: Option<DateTime<Utc>>,
    pub importance_score: i32,
    pub category: &'a str,
    pub urgency: &'a str,
    pub requires_action: bool,
    pub suggested_reply: Option<&'a str>,
    pub detected_tone: Option<&'a str>,
    pub pending_actions: &'a [String],
    pub due_date: Option<NaiveDate>,
    pub metadata: Value,
}

#[derive(Debug, Clone)]
pub struct AnalyzedEmailRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub gmail_message_id: String,
    pub sender: String,
    pub subject: String,
    pub date: Option<DateTime<Utc>>,
    pub importance_score: i32,
    pub category: String,
    pub urgency: String,
    pub requires_action: bool,
    pub suggested_reply: Option<String>,
    pub detected_tone: Option<String>,
    pub pending_actions: Vec<String>,
    pub due_date: Option<NaiveDate>,
    pub read: bool,
    pub answered: bool,
    pub answered_at: Option<DateTime<Utc>>,
    pub metadata: Value,
}

#[derive(Debug, Clone)]
pub struct SenderProfileUpsert<'a> {
    pub user_id: Uuid,
    pub email_account_id: Option<Uuid>,
    pub sender: &'a str,
    pub total_emails: i32,
    pub first_contact: Option<DateTime<Utc>>,
    pub last_contact: Option<DateTime<Utc>>,
    pub frequency_days: f64,
    pub typical_hour: i32,
    pub avg_length: i32,
    pub top_keywords: &'a [String],
    pub habitual_tone: &'a str,
    pub primary_topic: &'a str,
    pub importance_level: i32,
    pub communication_pattern: Option<&'a str>,
}

#[derive(Debug, Clone)]
pub struct HistoricRunStats {
    pub total_emails: i32,
    pub discarded: i32,
    pub valuable: i32,
    pub senders_learned: i32,
    pub llm_calls: i32,
    pub savings_percent: f64,
}

#[derive(Debug, Clone)]
pub struct WhatsAppMessageRecord {
    pub id: String,
    pub user_id: Uuid,
    pub chat_id: String,
    pub chat_name: String,
    pub content: String,
    pub ts: DateTime<Utc>,
    pub is_mine: bool,
    pub kind: String,
    pub device_id: Option<String>,
    pub processed_by_ai: bool,
}

#[derive(Debug, Clone)]
pub struct ChatMemoryRecord {
    pub chat_name: String,
    pub current_summary: String,
    pub open_topics: Option<String>,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct WhatsAppStats {
    pub total_messages: i64,
    pub unprocessed: i64,
    pub chats: i64,
    pub active_alerts: i64,
}
