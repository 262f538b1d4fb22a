//! Letter CRUD handlers. Each one is a single call into `LetterService`.

use axum::extract::{Path, State};
use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use serde_json::{json, Value};

use super::error::{ApiError, LetterOp};
use super::state::AppState;
use crate::core::identity::Identity;
use crate::core::letters::{LetterDocument, LetterSummary};

/// `GET /api/letters`
pub async fn list_letters(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<Vec<LetterSummary>>, ApiError> {
    let letters = state
        .letters
        .list(&identity)
        .await
        .map_err(ApiError::during(LetterOp::List))?;
    Ok(Json(letters))
}

/// `GET /api/letters/{id}` - the stored bytes, untouched.
pub async fn get_letter(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let body = state
        .letters
        .read(&identity, &id)
        .await
        .map_err(ApiError::during(LetterOp::Read))?;
    Ok(([(CONTENT_TYPE, "application/json")], body).into_response())
}

/// `POST /api/letters`
pub async fn create_letter(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(document): Json<LetterDocument>,
) -> Result<Json<Value>, ApiError> {
    let id = state
        .letters
        .create(&identity, &document)
        .await
        .map_err(ApiError::during(LetterOp::Create))?;
    Ok(Json(json!({ "id": id })))
}

/// `PUT /api/letters/{id}` - full overwrite, last write wins.
pub async fn update_letter(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
    Json(document): Json<LetterDocument>,
) -> Result<Json<Value>, ApiError> {
    state
        .letters
        .update(&identity, &id, &document)
        .await
        .map_err(ApiError::during(LetterOp::Update))?;
    Ok(Json(json!({ "success": true })))
}

/// `DELETE /api/letters/{id}`
pub async fn delete_letter(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    state
        .letters
        .delete(&identity, &id)
        .await
        .map_err(ApiError::during(LetterOp::Delete))?;
    Ok(Json(json!({ "success": true })))
}

pub async fn health() -> &'static str {
    "ok"
}
