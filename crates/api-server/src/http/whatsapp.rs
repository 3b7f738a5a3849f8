use std::io::Read;

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Extension, Multipart, Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use flate2::read::GzDecoder;
use shared::models::{
    BatchSyncResponse, BrainChatSummary, BrainResponse, HealthResponse, WhatsAppMessageUpload,
    WhatsAppStatsResponse,
};
use shared::whatsapp::{queue_transcription, run_brain_pass};
use tracing::{info, warn};
use uuid::Uuid;

use super::errors::{bad_request_response, forbidden_response, store_error_response};
use super::{AppState, AuthUser};

/// Bulk device upload. Optionally gzip-encoded; never touches the LLM — the
/// endpoint returns as fast as the store permits.
pub(super) async fn sync_batch(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let device_id = headers
        .get("x-device-id")
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);

    let is_gzip = headers
        .get("content-encoding")
        .and_then(|value| value.to_str().ok())
        .is_some_and(|encoding| encoding.contains("gzip"));

    let payload = if is_gzip {
        let mut decoder = GzDecoder::new(body.as_ref());
        let mut decoded = Vec::new();
        if let Err(err) = decoder.read_to_end(&mut decoded) {
            return bad_request_response("invalid_gzip", &format!("gzip decode failed: {err}"));
        }
        decoded
    } else {
        body.to_vec()
    };

    let messages: Vec<WhatsAppMessageUpload> = match serde_json::from_slice(&payload) {
        Ok(messages) => messages,
        Err(err) => {
            return bad_request_response("invalid_batch", &format!("batch decode failed: {err}"));
        }
    };

    if let Some(expected) = headers
        .get("x-batch-size")
        .and_then(|value| value.to_str().ok())
        .and_then(|raw| raw.parse::<usize>().ok())
        && expected != messages.len()
    {
        warn!(
            "batch size header says {expected} but body carries {}",
            messages.len()
        );
    }

    match state
        .store
        .upsert_whatsapp_messages(user.user_id, device_id.as_deref(), &messages)
        .await
    {
        Ok(saved) => {
            info!("whatsapp batch stored: {saved} messages for {}", user.user_id);
            (
                StatusCode::OK,
                Json(BatchSyncResponse {
                    status: "ok".to_string(),
                    mensajes_guardados: saved,
                }),
            )
                .into_response()
        }
        Err(err) => store_error_response(err),
    }
}

pub(super) async fn activate_brain(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Response {
    match run_brain_pass(&state.store, state.gateway.as_ref(), user.user_id).await {
        Ok(outcomes) => (
            StatusCode::OK,
            Json(BrainResponse {
                status: "ok".to_string(),
                resumen_operacion: outcomes
                    .into_iter()
                    .map(|outcome| BrainChatSummary {
                        chat: outcome.chat,
                        mensajes: outcome.mensajes,
                        tareas_creadas: outcome.tareas_creadas,
                    })
                    .collect(),
            }),
        )
            .into_response(),
        Err(err) => store_error_response(err),
    }
}

pub(super) async fn stats(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(user_id): Path<Uuid>,
) -> Response {
    if user_id != user.user_id {
        return forbidden_response();
    }

    match state.store.whatsapp_stats(user_id).await {
        Ok(stats) => (
            StatusCode::OK,
            Json(WhatsAppStatsResponse {
                total_mensajes: stats.total_messages,
                sin_procesar: stats.unprocessed,
                chats: stats.chats,
                alertas_activas: stats.active_alerts,
            }),
        )
            .into_response(),
        Err(err) => store_error_response(err),
    }
}

pub(super) async fn health() -> Response {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok".to_string(),
            timestamp: Utc::now(),
        }),
    )
        .into_response()
}

/// Accepts the audio, queues background STT, and answers immediately. The
/// transcript later rewrites the message row and re-opens it for the brain.
pub(super) async fn transcribe_audio(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    mut multipart: Multipart,
) -> Response {
    let mut audio: Option<Vec<u8>> = None;
    let mut mensaje_id: Option<String> = None;
    let mut chat_nombre: Option<String> = None;

    while let Ok(Some(field)) = multipart.next_field().await {
        match field.name() {
            Some("archivo") => match field.bytes().await {
                Ok(bytes) => audio = Some(bytes.to_vec()),
                Err(err) => {
                    return bad_request_response(
                        "invalid_file",
                        &format!("audio upload failed: {err}"),
                    );
                }
            },
            Some("mensaje_id") => {
                mensaje_id = field.text().await.ok().map(|text| text.trim().to_string());
            }
            Some("chat_nombre") => {
                chat_nombre = field.text().await.ok().map(|text| text.trim().to_string());
            }
            _ => {}
        }
    }

    let (Some(audio), Some(mensaje_id), Some(chat_nombre)) = (audio, mensaje_id, chat_nombre)
    else {
        return bad_request_response(
            "missing_fields",
            "archivo, mensaje_id and chat_nombre are required",
        );
    };

    let temp_path = std::env::temp_dir().join(format!("nexus-audio-{}.ogg", Uuid::new_v4()));
    if let Err(err) = tokio::fs::write(&temp_path, &audio).await {
        return store_error_response(shared::repos::StoreError::InvalidData(format!(
            "temp audio write failed: {err}"
        )));
    }

    queue_transcription(
        state.store.clone(),
        state.transcriber.clone(),
        user.user_id,
        mensaje_id,
        chat_nombre,
        temp_path,
    );

    (
        StatusCode::OK,
        Json(serde_json::json!({ "status": "encolado" })),
    )
        .into_response()
}
