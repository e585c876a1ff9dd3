use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};

use wager_common::types::DashboardEntry;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/api/notifications", get(list_recent))
}

/// GET /api/notifications: Dashboard buffer, newest first.
async fn list_recent(State(state): State<AppState>) -> Json<Vec<DashboardEntry>> {
    Json(state.hub.recent().await)
}
