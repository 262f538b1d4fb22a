//! Bearer token middleware.

use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;

use super::error::ApiError;
use super::state::AppState;
use crate::core::identity::AuthError;

/// Verifies the bearer token on every request and attaches the decoded
/// `Identity` to the request extensions.
///
/// Returns 401 Unauthorized if the token is missing or invalid; the handler
/// is never reached in that case.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(request.headers()).map_err(|e| {
        tracing::warn!("Rejected request: {}", e);
        ApiError::Unauthorized
    })?;

    let identity = state.verifier.verify(token).await.map_err(|e| {
        tracing::warn!("Rejected request: {}", e);
        ApiError::Unauthorized
    })?;

    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}

/// Extracts the token from `Authorization: Bearer <token>`.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or(AuthError::MissingToken)?
        .to_str()
        .map_err(|_| AuthError::Malformed("non-ASCII Authorization header".to_string()))?;

    let token = value
        .strip_prefix("Bearer ")
        .ok_or_else(|| AuthError::Malformed("expected Bearer scheme".to_string()))?
        .trim();

    if token.is_empty() {
        return Err(AuthError::MissingToken);
    }
    Ok(token)
}
