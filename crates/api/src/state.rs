//! Shared application state for the Axum server.

use std::sync::Arc;

use sqlx::PgPool;
use tokio_util::sync::CancellationToken;

use wager_common::config::AppConfig;
use wager_notifier::DashboardHub;

/// Application state shared across all route handlers via Axum `State`.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub hub: Arc<DashboardHub>,
    pub config: AppConfig,
    /// Cancelled on process shutdown; open push connections close on it.
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(
        pool: PgPool,
        hub: Arc<DashboardHub>,
        config: AppConfig,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            pool,
            hub,
            config,
            shutdown,
        }
    }
}
