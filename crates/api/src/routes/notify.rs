//! Internal notify endpoint used by backend services to message a chat.

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;

use relay_common::error::AppError;

use crate::middleware::auth::InternalCaller;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/internal/notify", post(internal_notify))
}

#[derive(Debug, Deserialize)]
pub struct NotifyRequest {
    pub chat_id: i64,
    pub text: String,
}

/// POST /internal/notify — Send `text` to `chat_id`. Requires `X-Internal-Token`.
async fn internal_notify(
    State(state): State<AppState>,
    _caller: InternalCaller,
    Json(req): Json<NotifyRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    if req.text.trim().is_empty() {
        return Err(AppError::Validation("text must not be empty".to_string()));
    }

    state
        .transport
        .send_text(req.chat_id, &req.text)
        .await
        .map_err(|e| {
            tracing::error!(chat_id = req.chat_id, error = %e, "Internal notify dispatch failed");
            AppError::Transport(e.to_string())
        })?;

    tracing::info!(chat_id = req.chat_id, "Internal notification dispatched");
    Ok(Json(json!({ "ok": true })))
}
