//! Telegram webhook route.

use axum::body::Bytes;
use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::json;

use relay_notifier::updates::Update;

use crate::inbound;
use crate::state::AppState;

pub fn router(path: &str) -> Router<AppState> {
    Router::new().route(path, post(telegram_webhook))
}

/// POST <webhook path> — Feed one Telegram update to the inbound handler.
///
/// Always acknowledges once handling returns, even for an update that does
/// not decode, so Telegram never redelivers it. Intake submissions started by
/// the update keep running in the background.
async fn telegram_webhook(State(state): State<AppState>, body: Bytes) -> Json<serde_json::Value> {
    match serde_json::from_slice::<Update>(&body) {
        Ok(update) => inbound::handle_update(&state, update).await,
        Err(e) => tracing::warn!(error = %e, bytes = body.len(), "Dropping undecodable update"),
    }
    Json(json!({ "status": "ok" }))
}
