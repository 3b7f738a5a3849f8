use axum::Json;
use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use serde_json::json;
use shared::email::{
    GmailClient, HistoricOutcome, TriageEngine, gmail, run_historic_analysis,
};
use shared::models::{
    AnalyzedEmailDto, AnsweredEmailsResponse, MarkAnsweredRequest, PendingEmailsResponse,
    SendEmailRequest, SyncEmailsRequest,
};
use shared::repos::AnalyzedEmailRecord;
use tracing::warn;
use uuid::Uuid;

use super::errors::{
    bad_gateway_response, bad_request_response, not_found_response, store_error_response,
};
use super::{AppState, AuthUser};

const UNREAD_FETCH_LIMIT: u32 = 50;
const DEFAULT_ANSWERED_LIMIT: i64 = 20;

/// Fetch-unread → dedupe → three-layer cascade. The account row is upserted
/// first so refreshed tokens survive the sync.
pub(super) async fn sync_emails(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<SyncEmailsRequest>,
) -> Response {
    if req.email_gmail.trim().is_empty() {
        return bad_request_response("missing_email", "email_gmail must not be empty");
    }

    // A mobile serverAuthCode upgrades to a long-lived refresh token when the
    // server-side OAuth client is configured.
    let mut refresh_token = req.refresh_token.clone();
    let mut access_token = req.gmail_access_token.clone();
    if let (Some(code), Some(client_id), Some(client_secret)) = (
        req.server_auth_code.as_deref(),
        state.config.google_oauth_client_id.as_deref(),
        state.config.google_oauth_client_secret.as_deref(),
    ) {
        match gmail::exchange_auth_code(&state.http_client, client_id, client_secret, code).await {
            Ok((exchanged_access, exchanged_refresh)) => {
                access_token = exchanged_access;
                refresh_token = exchanged_refresh.or(refresh_token);
            }
            Err(err) => warn!("server auth code exchange failed: {err}"),
        }
    }

    let account_id = match state
        .store
        .upsert_email_account(
            user.user_id,
            &req.email_gmail,
            &access_token,
            refresh_token.as_deref(),
            state.config.google_oauth_client_id.as_deref(),
            state.config.google_oauth_client_secret.as_deref(),
        )
        .await
    {
        Ok(id) => id,
        Err(err) => return store_error_response(err),
    };

    let gmail_client = match GmailClient::new(access_token) {
        Ok(client) => client,
        Err(err) => return bad_gateway_response("gmail_unavailable", &err.to_string()),
    };

    let emails = match gmail_client.list_unread(UNREAD_FETCH_LIMIT).await {
        Ok(emails) => emails,
        Err(err) => return bad_gateway_response("gmail_fetch_failed", &err.to_string()),
    };

    let engine = TriageEngine::new(state.config.email_pacing_seconds);
    let user_name = user.email.as_deref().unwrap_or("").to_string();
    let report = match engine
        .process_batch(
            &state.store,
            state.gateway.as_ref(),
            state.push_ref(),
            user.user_id,
            Some(account_id),
            emails,
            &user_name,
        )
        .await
    {
        Ok(report) => report,
        Err(err) => return store_error_response(err),
    };

    let correos_importantes: Vec<_> = report
        .criticos
        .iter()
        .map(|critical| {
            json!({
                "remitente": critical.sender,
                "asunto": critical.subject,
                "resumen": critical.short_summary,
            })
        })
        .collect();
    let top_correo = correos_importantes.first().cloned();

    (
        StatusCode::OK,
        Json(json!({
            "status": "success",
            "estadisticas": {
                "procesados": report.stats.procesados,
                "spam_descartado": report.stats.spam_descartado,
                "accion_baja": report.stats.accion_baja,
                "accion_media": report.stats.accion_media,
                "accion_alta": report.stats.accion_alta,
                "duplicados": report.stats.duplicados,
            },
            "correos_importantes": correos_importantes,
            "top_correo": top_correo,
        })),
    )
        .into_response()
}

#[derive(Debug, Deserialize)]
pub(super) struct HistoryRequest {
    pub gmail_access_token: String,
    pub email_gmail: String,
}

/// One-shot historic pass; the completion marker makes re-runs cheap no-ops.
pub(super) async fn analyze_history(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<HistoryRequest>,
) -> Response {
    let gmail_client = match GmailClient::new(req.gmail_access_token) {
        Ok(client) => client,
        Err(err) => return bad_gateway_response("gmail_unavailable", &err.to_string()),
    };

    let engine = TriageEngine::new(state.config.email_pacing_seconds);
    let outcome = run_historic_analysis(
        &state.store,
        state.gateway.as_ref(),
        &engine,
        &gmail_client,
        user.user_id,
        &req.email_gmail,
        state.config.email_pacing_seconds,
    )
    .await;

    match outcome {
        Ok(HistoricOutcome::AlreadyAnalyzed) => (
            StatusCode::OK,
            Json(json!({
                "status": "ya_analizado",
                "mensaje": "Cuenta previamente analizada",
            })),
        )
            .into_response(),
        Ok(HistoricOutcome::Completed(stats)) => (
            StatusCode::OK,
            Json(json!({
                "status": "success",
                "total_correos": stats.total_emails,
                "spam_descartado": stats.discarded,
                "correos_valor": stats.valuable,
                "remitentes_aprendidos": stats.senders_learned,
                "llamadas_ia": stats.llm_calls,
                "ahorro_porcentaje": stats.savings_percent,
            })),
        )
            .into_response(),
        Err(err) => store_error_response(err),
    }
}

pub(super) async fn send_email(
    State(_state): State<AppState>,
    Extension(_user): Extension<AuthUser>,
    Json(req): Json<SendEmailRequest>,
) -> Response {
    if req.destinatario.trim().is_empty() {
        return bad_request_response("missing_recipient", "destinatario must not be empty");
    }

    let gmail_client = match GmailClient::new(req.gmail_access_token) {
        Ok(client) => client,
        Err(err) => return bad_gateway_response("gmail_unavailable", &err.to_string()),
    };

    match gmail_client
        .send(
            &req.destinatario,
            &req.asunto,
            &req.cuerpo,
            req.thread_id.as_deref(),
        )
        .await
    {
        Ok(()) => (StatusCode::OK, Json(json!({ "status": "enviado" }))).into_response(),
        Err(err) => bad_gateway_response("gmail_send_failed", &err.to_string()),
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct PendingQuery {
    #[serde(default)]
    filtro: Option<String>,
}

pub(super) async fn pending_emails(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<PendingQuery>,
) -> Response {
    let only_pending = query.filtro.as_deref().unwrap_or("pendientes") != "todos";

    match state
        .store
        .list_analyzed_emails(user.user_id, only_pending)
        .await
    {
        Ok(emails) => (
            StatusCode::OK,
            Json(PendingEmailsResponse {
                correos: emails.into_iter().map(email_dto).collect(),
            }),
        )
            .into_response(),
        Err(err) => store_error_response(err),
    }
}

pub(super) async fn mark_email_read(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(email_id): Path<Uuid>,
) -> Response {
    match state.store.mark_email_read(email_id, user.user_id).await {
        Ok(true) => (
            StatusCode::OK,
            Json(json!({ "mensaje": "Correo marcado como leído" })),
        )
            .into_response(),
        Ok(false) => not_found_response(),
        Err(err) => store_error_response(err),
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct AnsweredQuery {
    #[serde(default)]
    limite: Option<i64>,
}

pub(super) async fn answered_emails(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<AnsweredQuery>,
) -> Response {
    let limit = query
        .limite
        .filter(|limit| *limit > 0)
        .unwrap_or(DEFAULT_ANSWERED_LIMIT);

    match state.store.list_answered_emails(user.user_id, limit).await {
        Ok(emails) => {
            let correos: Vec<AnalyzedEmailDto> = emails.into_iter().map(email_dto).collect();
            let total = correos.len();
            (
                StatusCode::OK,
                Json(AnsweredEmailsResponse { correos, total }),
            )
                .into_response()
        }
        Err(err) => store_error_response(err),
    }
}

pub(super) async fn mark_email_answered(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(email_id): Path<Uuid>,
    Json(req): Json<MarkAnsweredRequest>,
) -> Response {
    match state
        .store
        .mark_email_answered(
            email_id,
            user.user_id,
            req.fecha_respuesta,
            &req.respuesta_enviada,
        )
        .await
    {
        Ok(true) => (StatusCode::OK, Json(json!({ "status": "success" }))).into_response(),
        Ok(false) => not_found_response(),
        Err(err) => store_error_response(err),
    }
}

pub(super) async fn revert_email_answered(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(email_id): Path<Uuid>,
) -> Response {
    match state.store.revert_email_answered(email_id, user.user_id).await {
        Ok(true) => (StatusCode::OK, Json(json!({ "status": "success" }))).into_response(),
        Ok(false) => not_found_response(),
        Err(err) => store_error_response(err),
    }
}

fn email_dto(email: AnalyzedEmailRecord) -> AnalyzedEmailDto {
    AnalyzedEmailDto {
        id: email.id,
        remitente: email.sender,
        asunto: email.subject,
        fecha: email.date,
        score_importancia: email.importance_score,
        categoria: email.category,
        urgencia: email.urgency,
        requiere_accion: email.requires_action,
        respuesta_sugerida: email.suggested_reply,
        tono_detectado: email.detected_tone,
        acciones_pendientes: email.pending_actions,
        fecha_limite: email.due_date,
        leido: email.read,
        respondido: email.answered,
        respondido_en: email.answered_at,
    }
}
