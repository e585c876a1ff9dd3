pub mod config;
pub mod health;
pub mod notifications;

use axum::Router;
use axum::routing::get;

use crate::state::AppState;
use crate::ws::ws_handler;

/// Build the complete router: HTTP routes plus the `/ws` push endpoint.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(health::router())
        .merge(notifications::router())
        .merge(config::router())
        .route("/ws", get(ws_handler))
        .with_state(state)
}
