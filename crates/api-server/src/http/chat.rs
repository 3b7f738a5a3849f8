use axum::Json;
use axum::extract::{Extension, Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use shared::llm::IntentKind;
use shared::models::{ChatRequest, ChatResponse, Origin, StatusDataResponse};
use shared::pipeline::{answer_query, classify_intent, process_task, process_value};
use tracing::info;

use super::errors::{bad_request_response, store_error_response};
use super::{AppState, AuthUser};

const NOISE_REPLY: &str = "¡Hola! 👋 ¿En qué te ayudo?";

/// Intent-gated main entry: noise gets a canned reply, consultas go to the
/// read-only engine, tasks and value take their pipelines.
pub(super) async fn chat(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<ChatRequest>,
) -> Response {
    let message = req.mensaje.trim();
    if message.is_empty() {
        return bad_request_response("empty_message", "mensaje must not be empty");
    }

    let decision = classify_intent(state.gateway.as_ref(), message).await;
    info!(
        "chat intent for {}: {:?} (subtipo {:?})",
        user.user_id, decision.kind, decision.subtipo
    );

    // A consulta routes to the read-only engine regardless of gate type.
    if decision.subtipo.as_deref() == Some("consulta") {
        return match answer_query(
            &state.store,
            state.gateway.as_ref(),
            state.embedder_ref(),
            user.user_id,
            message,
            req.modo_profundo,
        )
        .await
        {
            Ok(respuesta) => (
                StatusCode::OK,
                Json(ChatResponse {
                    respuesta,
                    metadata: None,
                    alertas_generadas: None,
                    nuevos_aprendizajes: None,
                }),
            )
                .into_response(),
            Err(err) => store_error_response(err),
        };
    }

    match decision.kind {
        IntentKind::Noise => (
            StatusCode::OK,
            Json(ChatResponse {
                respuesta: NOISE_REPLY.to_string(),
                metadata: None,
                alertas_generadas: None,
                nuevos_aprendizajes: None,
            }),
        )
            .into_response(),
        IntentKind::Task => {
            match process_task(
                &state.store,
                state.gateway.as_ref(),
                state.push_ref(),
                user.user_id,
                user.email.as_deref(),
                message,
                None,
            )
            .await
            {
                Ok(outcome) => (
                    StatusCode::OK,
                    Json(ChatResponse {
                        respuesta: outcome.respuesta,
                        metadata: Some(outcome.alert.metadata),
                        alertas_generadas: Some(vec![outcome.alert.titulo]),
                        nuevos_aprendizajes: None,
                    }),
                )
                    .into_response(),
                Err(err) => store_error_response(err),
            }
        }
        IntentKind::Value => {
            match process_value(
                &state.store,
                state.gateway.as_ref(),
                state.embedder_ref(),
                state.push_ref(),
                user.user_id,
                message,
                decision.urgency,
                Origin::AppChat,
            )
            .await
            {
                Ok(outcome) => (
                    StatusCode::OK,
                    Json(ChatResponse {
                        respuesta: outcome.respuesta,
                        metadata: None,
                        alertas_generadas: some_if_nonempty(outcome.alertas_generadas),
                        nuevos_aprendizajes: some_if_nonempty(outcome.nuevos_aprendizajes),
                    }),
                )
                    .into_response(),
                Err(err) => store_error_response(err),
            }
        }
    }
}

/// Multipart file upload: each text file runs through the value pipeline.
pub(super) async fn analyze_files(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    mut multipart: Multipart,
) -> Response {
    let mut alertas = Vec::new();
    let mut aprendizajes = Vec::new();
    let mut processed = 0usize;

    while let Ok(Some(field)) = multipart.next_field().await {
        let Ok(bytes) = field.bytes().await else {
            continue;
        };
        let content = String::from_utf8_lossy(&bytes);
        let content = content.trim();
        if content.is_empty() {
            continue;
        }

        match process_value(
            &state.store,
            state.gateway.as_ref(),
            state.embedder_ref(),
            state.push_ref(),
            user.user_id,
            content,
            shared::models::Priority::Medium,
            Origin::AppFile,
        )
        .await
        {
            Ok(outcome) => {
                processed += 1;
                alertas.extend(outcome.alertas_generadas);
                aprendizajes.extend(outcome.nuevos_aprendizajes);
            }
            Err(err) => return store_error_response(err),
        }
    }

    if processed == 0 {
        return bad_request_response("no_files", "no readable text files in the upload");
    }

    let respuesta = format!(
        "Procesé {processed} archivo(s): {} tarea(s) y {} aprendizaje(s).",
        alertas.len(),
        aprendizajes.len()
    );

    (
        StatusCode::OK,
        Json(StatusDataResponse {
            status: "success".to_string(),
            data: json!({
                "respuesta": respuesta,
                "alertas_generadas": alertas,
                "nuevos_aprendizajes": aprendizajes,
            }),
        }),
    )
        .into_response()
}

fn some_if_nonempty(values: Vec<String>) -> Option<Vec<String>> {
    if values.is_empty() { None } else { Some(values) }
}
