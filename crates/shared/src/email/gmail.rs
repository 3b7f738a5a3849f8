use std::sync::LazyLock;
use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Deserialize;
use serde_json::{Value, json};
use thiserror::Error;
use tracing::warn;

const GMAIL_BASE_URL: &str = "https://gmail.googleapis.com/gmail/v1/users/me";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const DEFAULT_TIMEOUT_MS: u64 = 20_000;

#[derive(Debug, Error)]
pub enum GmailError {
    #[error("gmail request failed: {0}")]
    Request(String),
    #[error("gmail responded with status {0}")]
    Status(u16),
    #[error("gmail payload was invalid: {0}")]
    InvalidPayload(String),
    #[error("oauth token exchange failed: {0}")]
    TokenExchange(String),
}

/// Simplified message shape the triage layers consume.
#[derive(Debug, Clone)]
pub struct FetchedEmail {
    pub id: String,
    pub thread_id: Option<String>,
    pub sender: String,
    pub sender_full: String,
    pub subject: String,
    pub body: String,
    pub date: Option<DateTime<Utc>>,
    pub labels: Vec<String>,
}

static RE_ADDR_IN_ANGLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<(.+?)>").expect("valid angle-address regex"));

pub struct GmailClient {
    client: reqwest::Client,
    access_token: String,
}

impl GmailClient {
    pub fn new(access_token: impl Into<String>) -> Result<Self, GmailError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(DEFAULT_TIMEOUT_MS))
            .build()
            .map_err(|err| GmailError::Request(err.to_string()))?;
        Ok(Self {
            client,
            access_token: access_token.into(),
        })
    }

    pub async fn list_unread(&self, max_results: u32) -> Result<Vec<FetchedEmail>, GmailError> {
        self.list_by_query("is:unread", max_results).await
    }

    /// Most recent messages regardless of read state, for the historic pass.
    pub async fn list_recent(&self, max_results: u32) -> Result<Vec<FetchedEmail>, GmailError> {
        self.list_by_query("", max_results).await
    }

    async fn list_by_query(
        &self,
        query: &str,
        max_results: u32,
    ) -> Result<Vec<FetchedEmail>, GmailError> {
        let mut url = format!("{GMAIL_BASE_URL}/messages?maxResults={max_results}");
        if !query.is_empty() {
            url.push_str("&q=");
            url.push_str(&urlencoded(query));
        }

        let listing: MessageListing = self.get_json(&url).await?;

        let mut emails = Vec::new();
        for reference in listing.messages.unwrap_or_default() {
            match self.fetch_message(&reference.id).await {
                Ok(Some(email)) => emails.push(email),
                Ok(None) => {}
                // One unreadable message never kills the batch.
                Err(err) => warn!("gmail message {} fetch failed: {err}", reference.id),
            }
        }
        Ok(emails)
    }

    pub async fn fetch_message(&self, id: &str) -> Result<Option<FetchedEmail>, GmailError> {
        let url = format!("{GMAIL_BASE_URL}/messages/{id}?format=full");
        let message: Value = self.get_json(&url).await?;
        Ok(parse_message(&message))
    }

    /// Raw MIME send; replies join their thread via `thread_id`.
    pub async fn send(
        &self,
        to: &str,
        subject: &str,
        body: &str,
        thread_id: Option<&str>,
    ) -> Result<(), GmailError> {
        let mime = format!(
            "To: {to}\r\nSubject: {subject}\r\nContent-Type: text/plain; charset=\"UTF-8\"\r\n\r\n{body}"
        );
        let raw = URL_SAFE_NO_PAD.encode(mime.as_bytes());

        let mut payload = json!({ "raw": raw });
        if let Some(thread_id) = thread_id {
            payload["threadId"] = json!(thread_id);
        }

        let url = format!("{GMAIL_BASE_URL}/messages/send");
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(&payload)
            .send()
            .await
            .map_err(|err| GmailError::Request(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(GmailError::Status(status.as_u16()));
        }
        Ok(())
    }

    pub async fn mark_read(&self, id: &str) -> Result<(), GmailError> {
        let url = format!("{GMAIL_BASE_URL}/messages/{id}/modify");
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(&json!({ "removeLabelIds": ["UNREAD"] }))
            .send()
            .await
            .map_err(|err| GmailError::Request(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(GmailError::Status(status.as_u16()));
        }
        Ok(())
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, GmailError> {
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|err| GmailError::Request(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(GmailError::Status(status.as_u16()));
        }

        response
            .json::<T>()
            .await
            .map_err(|err| GmailError::InvalidPayload(err.to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct MessageListing {
    messages: Option<Vec<MessageRef>>,
}

#[derive(Debug, Deserialize)]
struct MessageRef {
    id: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
}

/// Server-side exchange of a mobile `serverAuthCode` for tokens.
pub async fn exchange_auth_code(
    client: &reqwest::Client,
    client_id: &str,
    client_secret: &str,
    auth_code: &str,
) -> Result<(String, Option<String>), GmailError> {
    let response = client
        .post(GOOGLE_TOKEN_URL)
        .form(&[
            ("grant_type", "authorization_code"),
            ("code", auth_code),
            ("client_id", client_id),
            ("client_secret", client_secret),
            ("redirect_uri", ""),
        ])
        .send()
        .await
        .map_err(|err| GmailError::TokenExchange(err.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(GmailError::TokenExchange(format!("status {status}")));
    }

    let parsed: TokenResponse = response
        .json()
        .await
        .map_err(|err| GmailError::TokenExchange(err.to_string()))?;
    Ok((parsed.access_token, parsed.refresh_token))
}

/// Mints a fresh access token from a stored refresh token.
pub async fn refresh_access_token(
    client: &reqwest::Client,
    client_id: &str,
    client_secret: &str,
    refresh_token: &str,
) -> Result<String, GmailError> {
    let response = client
        .post(GOOGLE_TOKEN_URL)
        .form(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", client_id),
            ("client_secret", client_secret),
        ])
        .send()
        .await
        .map_err(|err| GmailError::TokenExchange(err.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(GmailError::TokenExchange(format!("status {status}")));
    }

    let parsed: TokenResponse = response
        .json()
        .await
        .map_err(|err| GmailError::TokenExchange(err.to_string()))?;
    Ok(parsed.access_token)
}

// --- payload parsing -------------------------------------------------------

fn parse_message(message: &Value) -> Option<FetchedEmail> {
    let id = message.get("id")?.as_str()?.to_string();
    let payload = message.get("payload")?;
    let headers = payload.get("headers")?.as_array()?;

    let sender_full = header_value(headers, "From").unwrap_or_default();
    let subject = header_value(headers, "Subject").unwrap_or_default();
    let date_raw = header_value(headers, "Date").unwrap_or_default();

    let labels = message
        .get("labelIds")
        .and_then(Value::as_array)
        .map(|values| {
            values
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    Some(FetchedEmail {
        sender: extract_address(&sender_full),
        sender_full,
        subject,
        body: extract_body(payload).unwrap_or_default(),
        date: parse_rfc2822_date(&date_raw),
        labels,
        thread_id: message
            .get("threadId")
            .and_then(Value::as_str)
            .map(str::to_string),
        id,
    })
}

fn header_value(headers: &[Value], name: &str) -> Option<String> {
    headers.iter().find_map(|header| {
        let header_name = header.get("name")?.as_str()?;
        if header_name.eq_ignore_ascii_case(name) {
            Some(header.get("value")?.as_str()?.to_string())
        } else {
            None
        }
    })
}

/// Recursive multipart walk preferring `text/plain` parts.
fn extract_body(payload: &Value) -> Option<String> {
    if let Some(data) = payload.pointer("/body/data").and_then(Value::as_str) {
        let decoded = decode_base64url(data);
        if !decoded.is_empty() {
            return Some(decoded);
        }
    }

    let parts = payload.get("parts")?.as_array()?;
    for part in parts {
        if part.get("mimeType").and_then(Value::as_str) == Some("text/plain")
            && let Some(data) = part.pointer("/body/data").and_then(Value::as_str)
        {
            let decoded = decode_base64url(data);
            if !decoded.is_empty() {
                return Some(decoded);
            }
        }
        if part.get("parts").is_some()
            && let Some(nested) = extract_body(part)
        {
            return Some(nested);
        }
    }
    None
}

fn decode_base64url(data: &str) -> String {
    URL_SAFE_NO_PAD
        .decode(data.trim_end_matches('='))
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        .unwrap_or_default()
}

/// `"Juan Pérez <juan@example.com>"` becomes `juan@example.com`.
pub fn extract_address(raw: &str) -> String {
    RE_ADDR_IN_ANGLE
        .captures(raw)
        .and_then(|caps| caps.get(1))
        .map(|found| found.as_str().to_string())
        .unwrap_or_else(|| raw.trim().to_string())
}

pub fn parse_rfc2822_date(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(raw.trim())
        .ok()
        .map(|stamped| stamped.with_timezone(&Utc))
}

fn urlencoded(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{extract_address, extract_body, parse_message, parse_rfc2822_date};

    #[test]
    fn address_extraction_handles_display_names() {
        assert_eq!(
            extract_address("Juan Pérez <juan@example.com>"),
            "juan@example.com"
        );
        assert_eq!(extract_address("  plain@example.com "), "plain@example.com");
    }

    #[test]
    fn rfc2822_dates_convert_to_utc() {
        let parsed =
            parse_rfc2822_date("Fri, 17 Jan 2026 10:30:00 -0500").expect("valid rfc2822 date");
        assert_eq!(parsed.to_rfc3339(), "2026-01-17T15:30:00+00:00");
        assert!(parse_rfc2822_date("not a date").is_none());
    }

    #[test]
    fn multipart_body_prefers_text_plain() {
        // "hola mundo" in base64url.
        let payload = json!({
            "mimeType": "multipart/alternative",
            "parts": [
                { "mimeType": "text/html", "body": { "data": "PGI+aG9sYTwvYj4" } },
                { "mimeType": "text/plain", "body": { "data": "aG9sYSBtdW5kbw" } }
            ]
        });
        assert_eq!(extract_body(&payload).as_deref(), Some("hola mundo"));
    }

    #[test]
    fn full_message_parses_into_simplified_shape() {
        let message = json!({
            "id": "msg-1",
            "threadId": "thread-1",
            "labelIds": ["UNREAD", "INBOX"],
            "payload": {
                "headers": [
                    { "name": "From", "value": "Ana Ruiz <ana@acme.pe>" },
                    { "name": "Subject", "value": "Segunda etapa entrevista" },
                    { "name": "Date", "value": "Fri, 17 Jan 2026 10:30:00 -0500" }
                ],
                "body": { "data": "bm9zIHZlbW9zIGVsIGx1bmVz" }
            }
        });

        let parsed = parse_message(&message).expect("message parses");
        assert_eq!(parsed.id, "msg-1");
        assert_eq!(parsed.sender, "ana@acme.pe");
        assert_eq!(parsed.subject, "Segunda etapa entrevista");
        assert_eq!(parsed.body, "nos vemos el lunes");
        assert!(parsed.labels.contains(&"UNREAD".to_string()));
    }
}
