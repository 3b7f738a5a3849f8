use axum::Form;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use shared::llm::IntentKind;
use shared::models::Origin;
use shared::pipeline::{classify_intent, process_task, process_value};
use tracing::{info, warn};

use super::AppState;

const EMPTY_TWIML: &str = r#"<?xml version="1.0" encoding="UTF-8"?><Response></Response>"#;

#[derive(Debug, Deserialize)]
pub(super) struct TwilioForm {
    #[serde(rename = "Body", default)]
    body: String,
}

/// Telco-style inbound webhook: form-urlencoded in, empty TwiML out. The
/// reply body is always the same; all effects happen against the configured
/// webhook user. An optional legacy `X-App-Password` header guards it.
pub(super) async fn twilio_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<TwilioForm>,
) -> Response {
    if let Some(expected) = state.config.app_password.as_deref() {
        let provided = headers
            .get("x-app-password")
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default();
        if provided != expected {
            warn!("webhook rejected: bad app password header");
            return (StatusCode::UNAUTHORIZED, ()).into_response();
        }
    }

    let message = form.body.trim().to_string();
    let Some(user_id) = state.config.webhook_user_id else {
        warn!("webhook received but WEBHOOK_USER_ID is not configured");
        return twiml_response();
    };
    if message.is_empty() {
        return twiml_response();
    }

    if let Err(err) = state.store.ensure_user(user_id, None).await {
        warn!("webhook user provisioning failed: {err}");
        return twiml_response();
    }

    let decision = classify_intent(state.gateway.as_ref(), &message).await;
    info!("webhook intent: {:?}", decision.kind);

    let result = match decision.kind {
        IntentKind::Noise => Ok(()),
        IntentKind::Task => process_task(
            &state.store,
            state.gateway.as_ref(),
            state.push_ref(),
            user_id,
            None,
            &message,
            None,
        )
        .await
        .map(|_| ()),
        IntentKind::Value => process_value(
            &state.store,
            state.gateway.as_ref(),
            state.embedder_ref(),
            state.push_ref(),
            user_id,
            &message,
            decision.urgency,
            Origin::WhatsappWebhook,
        )
        .await
        .map(|_| ()),
    };

    if let Err(err) = result {
        warn!("webhook pipeline failed: {err}");
    }

    twiml_response()
}

fn twiml_response() -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/xml")],
        EMPTY_TWIML,
    )
        .into_response()
}
