use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use shared::models::{ErrorBody, ErrorResponse};
use shared::repos::StoreError;
use tracing::error;

pub(super) fn bad_request_response(code: &str, message: &str) -> Response {
    error_response(StatusCode::BAD_REQUEST, code, message)
}

pub(super) fn unauthorized_response() -> Response {
    error_response(
        StatusCode::UNAUTHORIZED,
        "unauthorized",
        "Missing or invalid bearer token",
    )
}

pub(super) fn forbidden_response() -> Response {
    error_response(
        StatusCode::FORBIDDEN,
        "forbidden",
        "Resource is not owned by the caller",
    )
}

pub(super) fn not_found_response() -> Response {
    error_response(StatusCode::NOT_FOUND, "not_found", "Resource not found")
}

pub(super) fn bad_gateway_response(code: &str, message: &str) -> Response {
    error_response(StatusCode::BAD_GATEWAY, code, message)
}

/// Unrecoverable FK failure after the auto-provision retry: the legacy
/// clients expect this exact shape, not an HTTP error.
pub(super) fn error_db_response() -> Response {
    (
        StatusCode::OK,
        Json(json!({
            "status": "error_db",
            "respuesta": "No pude guardar en tu cuenta. Vuelve a iniciar sesión e inténtalo de nuevo."
        })),
    )
        .into_response()
}

pub(super) fn store_error_response(err: StoreError) -> Response {
    if err.is_foreign_key_violation() {
        return error_db_response();
    }
    error!("database operation failed: {err}");
    error_response(
        StatusCode::INTERNAL_SERVER_ERROR,
        "internal_error",
        "Unexpected server error",
    )
}

fn error_response(status: StatusCode, code: &str, message: &str) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message: message.to_string(),
            },
        }),
    )
        .into_response()
}
