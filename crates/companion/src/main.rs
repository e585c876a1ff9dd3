//! Wager companion binary entrypoint.
//!
//! Follows the notifier's push endpoint and shows each live bet as a
//! desktop alert until SIGINT/SIGTERM.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use wager_common::config::CompanionConfig;
use wager_companion::alert::renderer_from_config;
use wager_companion::{AlertRenderer, BackoffConfig, Forwarder, PushClient};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    tracing::info!("Starting wager companion...");

    let config = CompanionConfig::from_env()?;
    let client = PushClient::new(&config.notifier_url)?;
    let renderer: Arc<dyn AlertRenderer> = Arc::from(renderer_from_config(&config));
    let backoff = BackoffConfig::from(&config);

    tracing::info!(
        url = client.url(),
        renderer = %config.alert_renderer,
        "Following notification service"
    );

    let shutdown = CancellationToken::new();
    tokio::spawn(shutdown_signal(shutdown.clone()));

    let stats = Forwarder::new(client, renderer, backoff).run(shutdown).await;

    tracing::info!(
        alerts_rendered = stats.alerts_rendered,
        "Wager companion stopped."
    );
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("wager_companion=info"));

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
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
    }

    tracing::info!("Received shutdown signal, stopping...");
    shutdown.cancel();
}
