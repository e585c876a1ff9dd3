//! Wager notifier server binary entrypoint.
//!
//! Wires the record store, channel senders, dashboard hub, change-feed
//! listener and HTTP/push server together, then runs until SIGINT/SIGTERM.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use wager_common::config::{AppConfig, FeedMode};
use wager_common::db::{create_pool, run_migrations};
use wager_common::store::PgRecordStore;
use wager_listener::{ChangeFeedListener, ChangeSource, PgChangeFeed, PollingFeed};
use wager_notifier::{DashboardHub, Dispatcher, build_senders};

use wager_api::routes::create_router;
use wager_api::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("wager_api=info,wager_notifier=info,wager_listener=info,tower_http=info")
        }))
        .init();

    tracing::info!("Starting wager notifier...");

    // Load configuration
    let config = AppConfig::from_env()?;

    // Create database connection pool
    let pool = create_pool(&config.database_url, config.db_max_connections).await?;
    run_migrations(&pool).await?;

    let store = PgRecordStore::new(pool.clone());

    // Channel senders
    let senders = build_senders(&config.channels)?;
    if senders.is_empty() {
        tracing::warn!("No delivery channels enabled, only the dashboard will receive notifications");
    }

    let hub = Arc::new(DashboardHub::new());
    let dispatcher = Arc::new(Dispatcher::new(
        senders,
        Arc::clone(&hub),
        Arc::new(store.clone()),
    ));

    // Change feed: failing to subscribe at startup is fatal
    let source: Box<dyn ChangeSource> = match config.feed_mode {
        FeedMode::Listen => Box::new(PgChangeFeed::connect(store.clone()).await?),
        FeedMode::Poll => Box::new(PollingFeed::new(store.clone(), config.feed_poll_interval_ms)),
    };

    let shutdown = CancellationToken::new();
    let listener_task = tokio::spawn(
        ChangeFeedListener::new(source, dispatcher).run(shutdown.clone()),
    );

    // Build router
    let state = AppState::new(pool, hub, config.clone(), shutdown.clone());
    let app = create_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.web_port));
    tracing::info!("Notifier listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await?;

    // The server may also stop on its own; make sure the listener follows.
    shutdown.cancel();
    listener_task.await?;

    tracing::info!("Wager notifier stopped.");
    Ok(())
}

/// Resolve on Ctrl+C or SIGTERM and cancel `shutdown`.
async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
        _ = shutdown.cancelled() => {}
    }

    tracing::info!("Received shutdown signal, stopping gracefully...");
    shutdown.cancel();
}
