use axum::Json;
use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use serde_json::json;
use shared::models::{
    AlertDto, AlertLabel, AlertState, ListAlertsResponse, PatchAlertRequest,
    PriorityAlertsResponse, StatusDataResponse,
};
use shared::repos::{AlertListFilter, AlertRecord};
use uuid::Uuid;

use super::errors::{
    bad_request_response, forbidden_response, not_found_response, store_error_response,
};
use super::{AppState, AuthUser};

const DEFAULT_PRIORITY_LIMIT: i64 = 5;

#[derive(Debug, Deserialize)]
pub(super) struct ListQuery {
    #[serde(default)]
    estado: Option<String>,
}

pub(super) async fn list_alerts(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<ListQuery>,
) -> Response {
    let filter = match query.estado.as_deref().unwrap_or("pendiente") {
        "pendiente" => AlertListFilter::Pending,
        "completada" => AlertListFilter::Completed,
        "todas" => AlertListFilter::All,
        other => {
            return bad_request_response(
                "invalid_state",
                &format!("estado {other:?} is not one of pendiente|completada|todas"),
            );
        }
    };

    match state.store.list_alerts(user.user_id, filter).await {
        Ok(alerts) => (
            StatusCode::OK,
            Json(ListAlertsResponse {
                alertas: alerts.into_iter().map(alert_dto).collect(),
            }),
        )
            .into_response(),
        Err(err) => store_error_response(err),
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct PriorityQuery {
    #[serde(default)]
    limite: Option<i64>,
}

pub(super) async fn priority_alerts(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<PriorityQuery>,
) -> Response {
    let limit = query
        .limite
        .filter(|limit| *limit > 0)
        .unwrap_or(DEFAULT_PRIORITY_LIMIT);

    match state.store.priority_alerts(user.user_id, limit).await {
        Ok(alerts) => {
            let alertas: Vec<AlertDto> = alerts.into_iter().map(alert_dto).collect();
            let total = alertas.len();
            (
                StatusCode::OK,
                Json(PriorityAlertsResponse { alertas, total }),
            )
                .into_response()
        }
        Err(err) => store_error_response(err),
    }
}

/// State/label transitions. Ownership is checked before touching the row so
/// another user's alert id yields 403, not 404.
pub(super) async fn patch_alert(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(alert_id): Path<Uuid>,
    Json(req): Json<PatchAlertRequest>,
) -> Response {
    let state_change = match req.estado.as_deref() {
        None => None,
        Some(raw) => match AlertState::from_db(raw) {
            Some(parsed) => Some(parsed),
            None => {
                return bad_request_response(
                    "invalid_state",
                    &format!("estado {raw:?} is not one of pendiente|completada|descartada"),
                );
            }
        },
    };
    let label_change = match req.etiqueta.as_deref() {
        None => None,
        Some(raw) => match AlertLabel::parse_lenient(raw) {
            Some(parsed) => Some(parsed),
            None => {
                return bad_request_response("invalid_label", &format!("unknown etiqueta {raw:?}"));
            }
        },
    };
    if state_change.is_none() && label_change.is_none() {
        return bad_request_response("empty_patch", "nothing to update");
    }

    match state.store.alert_owner(alert_id).await {
        Ok(None) => return not_found_response(),
        Ok(Some(owner)) if owner != user.user_id => return forbidden_response(),
        Ok(Some(_)) => {}
        Err(err) => return store_error_response(err),
    }

    if let Some(new_state) = state_change {
        if let Err(err) = state
            .store
            .update_alert_state(alert_id, user.user_id, new_state)
            .await
        {
            return store_error_response(err);
        }
    }
    if let Some(new_label) = label_change {
        if let Err(err) = state
            .store
            .update_alert_label(alert_id, user.user_id, new_label)
            .await
        {
            return store_error_response(err);
        }
    }

    (
        StatusCode::OK,
        Json(StatusDataResponse {
            status: "success".to_string(),
            data: json!({
                "id": alert_id,
                "estado": req.estado,
                "etiqueta": req.etiqueta,
            }),
        }),
    )
        .into_response()
}

fn alert_dto(alert: AlertRecord) -> AlertDto {
    AlertDto {
        id: alert.id,
        titulo: alert.titulo,
        descripcion: alert.descripcion,
        prioridad: alert.priority.as_str().to_string(),
        tipo: alert.kind.as_str().to_string(),
        estado: alert.state.as_str().to_string(),
        etiqueta: alert.label.as_str().to_string(),
        fecha_alerta: alert.due_at,
        metadata: alert.metadata,
        creado_en: alert.created_at,
    }
}
