//! Health check endpoint.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;

use wager_common::error::AppError;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}

/// GET /health: Database round-trip plus hub counters.
async fn health_check(State(state): State<AppState>) -> Result<Json<serde_json::Value>, AppError> {
    sqlx::query("SELECT 1").execute(&state.pool).await?;

    Ok(Json(json!({
        "status": "ok",
        "service": "wager-notifier",
        "version": env!("CARGO_PKG_VERSION"),
        "buffered": state.hub.len().await,
        "viewers": state.hub.viewer_count(),
    })))
}
