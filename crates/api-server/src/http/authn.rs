use axum::extract::{Request, State};
use axum::http::header;
use axum::middleware::Next;
use axum::response::Response;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::Deserialize;
use tracing::warn;
use uuid::Uuid;

use super::errors::{store_error_response, unauthorized_response};
use super::{AppState, AuthUser};

#[derive(Debug, Deserialize)]
struct TokenClaims {
    sub: String,
    #[serde(default)]
    email: Option<String>,
}

/// Bearer JWT signed with the database JWT secret. The first successful
/// resolution of an unknown user id auto-provisions the row.
pub(super) async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    let auth_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();

    let token = auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty());

    let Some(token) = token else {
        warn!("missing or invalid authorization header");
        return unauthorized_response();
    };

    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_aud = false;

    let claims = match decode::<TokenClaims>(
        token,
        &DecodingKey::from_secret(state.config.jwt_secret.as_bytes()),
        &validation,
    ) {
        Ok(data) => data.claims,
        Err(err) => {
            warn!("token verification failed: {err}");
            return unauthorized_response();
        }
    };

    let Ok(user_id) = claims.sub.parse::<Uuid>() else {
        warn!("token subject is not a uuid");
        return unauthorized_response();
    };

    if let Err(err) = state.store.ensure_user(user_id, claims.email.as_deref()).await {
        return store_error_response(err);
    }

    req.extensions_mut().insert(AuthUser {
        user_id,
        email: claims.email,
    });
    next.run(req).await
}
