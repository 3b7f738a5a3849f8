use std::env;

use thiserror::Error;

pub const DEFAULT_FCM_SERVICE_ACCOUNT_PATH: &str = "/etc/secrets/firebase-service-account.json";

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub bind_addr: String,
    pub database_url: String,
    pub database_max_connections: u32,
    pub jwt_secret: String,
    pub app_password: Option<String>,
    pub gemini_api_key: String,
    pub google_oauth_client_id: Option<String>,
    pub google_oauth_client_secret: Option<String>,
    pub fcm_service_account_path: String,
    pub email_pacing_seconds: u64,
    pub webhook_user_id: Option<uuid::Uuid>,
    pub stt_base_url: Option<String>,
    pub stt_api_key: Option<String>,
}

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub database_url: String,
    pub database_max_connections: u32,
    pub fcm_service_account_path: String,
    pub morning_cron: String,
    pub evening_cron: String,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required env var {0}")]
    MissingVar(String),
    #[error("invalid integer in env var {0}")]
    ParseInt(String),
    #[error("invalid uuid in env var {0}")]
    ParseUuid(String),
}

impl ApiConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            bind_addr: env::var("API_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8000".to_string()),
            database_url: require_non_empty("DATABASE_URL")?,
            database_max_connections: parse_u32_env("DATABASE_MAX_CONNECTIONS", 10)?,
            jwt_secret: require_non_empty("SUPABASE_JWT_SECRET")?,
            app_password: optional_trimmed("APP_PASSWORD"),
            gemini_api_key: require_non_empty("GEMINI_API_KEY")?,
            google_oauth_client_id: optional_trimmed("GOOGLE_OAUTH_CLIENT_ID"),
            google_oauth_client_secret: optional_trimmed("GOOGLE_OAUTH_CLIENT_SECRET"),
            fcm_service_account_path: optional_trimmed("FCM_SERVICE_ACCOUNT_PATH")
                .unwrap_or_else(|| DEFAULT_FCM_SERVICE_ACCOUNT_PATH.to_string()),
            email_pacing_seconds: parse_u64_env("EMAIL_DEEP_ANALYSIS_PACING_SECONDS", 4)?,
            webhook_user_id: parse_uuid_env("WEBHOOK_USER_ID")?,
            stt_base_url: optional_trimmed("STT_BASE_URL"),
            stt_api_key: optional_trimmed("STT_API_KEY"),
        })
    }
}

impl WorkerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            database_url: require_non_empty("DATABASE_URL")?,
            database_max_connections: parse_u32_env("DATABASE_MAX_CONNECTIONS", 5)?,
            fcm_service_account_path: optional_trimmed("FCM_SERVICE_ACCOUNT_PATH")
                .unwrap_or_else(|| DEFAULT_FCM_SERVICE_ACCOUNT_PATH.to_string()),
            // 6-field cron (seconds first), evaluated in America/Lima.
            morning_cron: optional_trimmed("BRIEFING_MORNING_CRON")
                .unwrap_or_else(|| "0 0 6 * * *".to_string()),
            evening_cron: optional_trimmed("BRIEFING_EVENING_CRON")
                .unwrap_or_else(|| "0 0 18 * * *".to_string()),
        })
    }
}

fn require_non_empty(key: &str) -> Result<String, ConfigError> {
    optional_trimmed(key).ok_or_else(|| ConfigError::MissingVar(key.to_string()))
}

fn optional_trimmed(key: &str) -> Option<String> {
    env::var(key).ok().and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

fn parse_u32_env(key: &str, default: u32) -> Result<u32, ConfigError> {
    match optional_trimmed(key) {
        Some(raw) => raw
            .parse::<u32>()
            .map_err(|_| ConfigError::ParseInt(key.to_string())),
        None => Ok(default),
    }
}

fn parse_u64_env(key: &str, default: u64) -> Result<u64, ConfigError> {
    match optional_trimmed(key) {
        Some(raw) => raw
            .parse::<u64>()
            .map_err(|_| ConfigError::ParseInt(key.to_string())),
        None => Ok(default),
    }
}

fn parse_uuid_env(key: &str) -> Result<Option<uuid::Uuid>, ConfigError> {
    optional_trimmed(key)
        .map(|raw| {
            raw.parse::<uuid::Uuid>()
                .map_err(|_| ConfigError::ParseUuid(key.to_string()))
        })
        .transpose()
}
