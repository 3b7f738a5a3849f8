use std::sync::Arc;

use axum::routing::{get, patch, post};
use axum::{Router, middleware};
use shared::config::ApiConfig;
use shared::llm::{Embedder, LlmGateway};
use shared::push::FcmSender;
use shared::repos::Store;
use shared::whatsapp::Transcriber;
use uuid::Uuid;

mod alerts;
mod authn;
mod chat;
mod emails;
mod errors;
mod webhook;
mod whatsapp;

#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub config: ApiConfig,
    pub gateway: Arc<dyn LlmGateway>,
    pub embedder: Option<Arc<dyn Embedder>>,
    pub push: Option<Arc<FcmSender>>,
    pub transcriber: Arc<dyn Transcriber>,
    pub http_client: reqwest::Client,
}

impl AppState {
    pub(crate) fn embedder_ref(&self) -> Option<&dyn Embedder> {
        self.embedder.as_deref()
    }

    pub(crate) fn push_ref(&self) -> Option<&FcmSender> {
        self.push.as_deref()
    }
}

#[derive(Clone)]
pub(crate) struct AuthUser {
    pub(crate) user_id: Uuid,
    pub(crate) email: Option<String>,
}

pub fn build_router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/nexus/health", get(whatsapp::health))
        .route("/webhook", post(webhook::twilio_webhook))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/chat", post(chat::chat))
        .route("/api/analizar", post(chat::analyze_files))
        .route("/api/alertas", get(alerts::list_alerts))
        .route("/api/alertas/prioritarias", get(alerts::priority_alerts))
        .route("/api/alertas/{id}", patch(alerts::patch_alert))
        .route("/api/sincronizar-correos", post(emails::sync_emails))
        .route(
            "/api/analizar-historial-gmail",
            post(emails::analyze_history),
        )
        .route("/api/enviar-correo", post(emails::send_email))
        .route("/api/correos-pendientes", get(emails::pending_emails))
        .route(
            "/api/correos/{id}/marcar-leido",
            patch(emails::mark_email_read),
        )
        .route("/api/correos-respondidos", get(emails::answered_emails))
        .route(
            "/api/correos/{id}/marcar-respondido",
            patch(emails::mark_email_answered),
        )
        .route(
            "/api/correos/{id}/revertir-respondido",
            patch(emails::revert_email_answered),
        )
        .route("/nexus/sync/batch", post(whatsapp::sync_batch))
        .route("/nexus/cerebro/activar", post(whatsapp::activate_brain))
        .route("/nexus/estadisticas/{user_id}", get(whatsapp::stats))
        .route(
            "/nexus/transcribir_audio",
            post(whatsapp::transcribe_audio),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            authn::auth_middleware,
        ))
        .with_state(state);

    public_routes.merge(protected_routes)
}
