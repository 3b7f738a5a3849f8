use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::Mutex;
use tracing::warn;

const FCM_SCOPE: &str = "https://www.googleapis.com/auth/firebase.messaging";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const TOKEN_LIFETIME_SECONDS: i64 = 3600;

#[derive(Debug)]
pub enum PushSendError {
    Transient { code: String, message: String },
    Permanent { code: String, message: String },
}

/// Notification plus a strings-only data map; complex values must arrive
/// already JSON-stringified.
#[derive(Debug, Clone, Default)]
pub struct PushMessage {
    pub title: String,
    pub body: String,
    pub data: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct ServiceAccount {
    project_id: String,
    client_email: String,
    private_key: String,
}

#[derive(Debug, Serialize)]
struct OauthClaims {
    iss: String,
    scope: String,
    aud: String,
    iat: i64,
    exp: i64,
}

struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

/// FCM HTTP v1 sender backed by a Google service account. The OAuth token is
/// minted with an RS256-signed JWT and cached until shortly before expiry.
pub struct FcmSender {
    client: reqwest::Client,
    project_id: String,
    client_email: String,
    signing_key: EncodingKey,
    token_url: String,
    send_url_base: String,
    cached_token: Arc<Mutex<Option<CachedToken>>>,
}

impl FcmSender {
    pub fn from_service_account_file(path: &str) -> Result<Self, String> {
        let raw = std::fs::read_to_string(path)
            .map_err(|err| format!("cannot read service account file {path}: {err}"))?;
        let account: ServiceAccount = serde_json::from_str(&raw)
            .map_err(|err| format!("invalid service account file {path}: {err}"))?;

        let signing_key = EncodingKey::from_rsa_pem(account.private_key.as_bytes())
            .map_err(|err| format!("invalid service account private key: {err}"))?;

        Ok(Self {
            client: reqwest::Client::new(),
            send_url_base: format!(
                "https://fcm.googleapis.com/v1/projects/{}/messages:send",
                account.project_id
            ),
            project_id: account.project_id,
            client_email: account.client_email,
            signing_key,
            token_url: GOOGLE_TOKEN_URL.to_string(),
            cached_token: Arc::new(Mutex::new(None)),
        })
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub async fn send(
        &self,
        device_token: &str,
        message: &PushMessage,
    ) -> Result<(), PushSendError> {
        let access_token = self.access_token().await?;

        let payload = json!({
            "message": {
                "token": device_token,
                "notification": {
                    "title": message.title,
                    "body": message.body
                },
                "data": message.data
            }
        });

        let response = self
            .client
            .post(&self.send_url_base)
            .bearer_auth(access_token)
            .json(&payload)
            .send()
            .await
            .map_err(|err| PushSendError::Transient {
                code: "FCM_NETWORK_ERROR".to_string(),
                message: format!("FCM request failed: {err}"),
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        let code = format!("FCM_HTTP_{}", status.as_u16());
        let message = format!("FCM responded with status {status}: {body}");
        match classify_http_failure(status) {
            FailureClass::Transient => Err(PushSendError::Transient { code, message }),
            FailureClass::Permanent => Err(PushSendError::Permanent { code, message }),
        }
    }

    /// Best-effort variant used across pipelines: push delivery must never
    /// fail the request that triggered it.
    pub async fn send_silently(&self, device_token: &str, message: &PushMessage) {
        if let Err(err) = self.send(device_token, message).await {
            match err {
                PushSendError::Transient { code, message }
                | PushSendError::Permanent { code, message } => {
                    warn!("push dropped ({code}): {message}");
                }
            }
        }
    }

    async fn access_token(&self) -> Result<String, PushSendError> {
        let now = Utc::now();

        let mut cached = self.cached_token.lock().await;
        if let Some(token) = cached.as_ref()
            && token.expires_at > now + Duration::seconds(60)
        {
            return Ok(token.access_token.clone());
        }

        let assertion = self.signed_assertion(now)?;
        let response = self
            .client
            .post(&self.token_url)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await
            .map_err(|err| PushSendError::Transient {
                code: "FCM_TOKEN_NETWORK_ERROR".to_string(),
                message: format!("token request failed: {err}"),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(PushSendError::Permanent {
                code: "FCM_TOKEN_REJECTED".to_string(),
                message: format!("token endpoint responded with status {status}"),
            });
        }

        #[derive(Deserialize)]
        struct TokenResponse {
            access_token: String,
            expires_in: Option<i64>,
        }

        let parsed: TokenResponse =
            response.json().await.map_err(|_| PushSendError::Permanent {
                code: "FCM_TOKEN_INVALID".to_string(),
                message: "token endpoint returned an invalid payload".to_string(),
            })?;

        let expires_at =
            now + Duration::seconds(parsed.expires_in.unwrap_or(TOKEN_LIFETIME_SECONDS));
        *cached = Some(CachedToken {
            access_token: parsed.access_token.clone(),
            expires_at,
        });

        Ok(parsed.access_token)
    }

    fn signed_assertion(&self, now: DateTime<Utc>) -> Result<String, PushSendError> {
        let claims = OauthClaims {
            iss: self.client_email.clone(),
            scope: FCM_SCOPE.to_string(),
            aud: self.token_url.clone(),
            iat: now.timestamp(),
            exp: now.timestamp() + TOKEN_LIFETIME_SECONDS,
        };
        let header = Header::new(Algorithm::RS256);

        encode(&header, &claims, &self.signing_key).map_err(|err| PushSendError::Permanent {
            code: "FCM_ASSERTION_INVALID".to_string(),
            message: format!("failed to sign service account assertion: {err}"),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FailureClass {
    Transient,
    Permanent,
}

fn classify_http_failure(status: StatusCode) -> FailureClass {
    match status.as_u16() {
        408 | 425 | 429 | 500 | 502 | 503 | 504 => FailureClass::Transient,
        _ => FailureClass::Permanent,
    }
}

#[cfg(test)]
mod tests {
    use reqwest::StatusCode;

    use super::{FailureClass, PushMessage, classify_http_failure};

    #[test]
    fn classifies_retryable_http_status_codes_as_transient() {
        assert_eq!(
            classify_http_failure(StatusCode::TOO_MANY_REQUESTS),
            FailureClass::Transient
        );
        assert_eq!(
            classify_http_failure(StatusCode::SERVICE_UNAVAILABLE),
            FailureClass::Transient
        );
    }

    #[test]
    fn classifies_client_errors_as_permanent() {
        assert_eq!(
            classify_http_failure(StatusCode::NOT_FOUND),
            FailureClass::Permanent
        );
        assert_eq!(
            classify_http_failure(StatusCode::BAD_REQUEST),
            FailureClass::Permanent
        );
    }

    #[test]
    fn data_map_holds_only_strings() {
        let mut message = PushMessage {
            title: "Nueva tarea".to_string(),
            body: "Entrevista mañana 5pm".to_string(),
            data: Default::default(),
        };
        message
            .data
            .insert("ejecutar_automatico".to_string(), "true".to_string());
        message.data.insert(
            "acciones_json".to_string(),
            serde_json::to_string(&vec!["poner_alarma"]).expect("serializable"),
        );
        assert_eq!(message.data.len(), 2);
    }
}
