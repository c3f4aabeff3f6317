use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request, header::AUTHORIZATION},
    middleware::Next,
    response::Response,
};
use subtle::ConstantTimeEq;

use crate::{error::ApiError, state::AppState};

/// Bearer-token guard for `/internal/*`. Disabled when no token is configured.
pub async fn api_auth(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(expected) = state.api_token.as_deref() else {
        return Ok(next.run(req).await);
    };

    let provided = bearer_token(req.headers())
        .ok_or_else(|| ApiError::unauthorized("missing or invalid Authorization header"))?;

    if !bool::from(expected.as_bytes().ct_eq(provided.as_bytes())) {
        tracing::warn!(path = %req.uri().path(), "rejected request with invalid API token");
        return Err(ApiError::unauthorized("invalid token"));
    }

    Ok(next.run(req).await)
}

/// Token from an `Authorization: Bearer <token>` header, scheme matched
/// case-insensitively.
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?.trim_start();
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}
