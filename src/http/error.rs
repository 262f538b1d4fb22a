//! API error types mapped to HTTP status codes.
//!
//! Callers only ever see two outcomes: 401 for anything wrong with the token,
//! 500 with a fixed per-operation message for anything the storage backend
//! rejected. The underlying cause goes to the log, never to the response.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::core::letters::LetterError;

/// Which endpoint failed; decides the message in the 500 body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LetterOp {
    List,
    Read,
    Create,
    Update,
    Delete,
}

impl LetterOp {
    pub fn failure_message(self) -> &'static str {
        match self {
            LetterOp::List => "Failed to fetch letters",
            LetterOp::Read => "Failed to fetch letter",
            LetterOp::Create => "Failed to create letter",
            LetterOp::Update => "Failed to update letter",
            LetterOp::Delete => "Failed to delete letter",
        }
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Unauthorized")]
    Unauthorized,

    #[error("{}: {source}", .op.failure_message())]
    Letters {
        op: LetterOp,
        #[source]
        source: LetterError,
    },
}

impl ApiError {
    /// `map_err` adapter: `.map_err(ApiError::during(LetterOp::Read))`.
    pub fn during(op: LetterOp) -> impl FnOnce(LetterError) -> ApiError {
        move |source| ApiError::Letters { op, source }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized"),
            ApiError::Letters { op, source } => {
                tracing::error!(operation = ?op, "{}", source);
                (StatusCode::INTERNAL_SERVER_ERROR, op.failure_message())
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
