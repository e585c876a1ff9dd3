//! Reconnecting forwarder from the push endpoint to desktop alerts.
//!
//! ```text
//! Disconnected -> Connecting -> Connected -> (drop) Disconnected -> backoff -> Connecting ...
//! ```
//!
//! Live `notification` frames become alerts. The `recent` replay sent on
//! every (re)connect is only logged, so reconnecting never floods the
//! desktop with old bets.

use std::sync::Arc;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use wager_common::types::HubMessage;

use crate::alert::{AlertRenderer, DesktopAlert};
use crate::backoff::{BackoffConfig, next_delay};
use crate::client::{PushClient, PushConnection};

/// Connection state of the forwarder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Counters reported when the forwarder stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ForwarderStats {
    pub connections: u64,
    pub alerts_rendered: u64,
}

pub struct Forwarder {
    client: PushClient,
    renderer: Arc<dyn AlertRenderer>,
    backoff: BackoffConfig,
    state: watch::Sender<ConnectionState>,
    stats: ForwarderStats,
}

impl Forwarder {
    pub fn new(client: PushClient, renderer: Arc<dyn AlertRenderer>, backoff: BackoffConfig) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            client,
            renderer,
            backoff,
            state,
            stats: ForwarderStats::default(),
        }
    }

    /// Watch state transitions.
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    pub fn stats(&self) -> ForwarderStats {
        self.stats
    }

    fn set_state(&self, next: ConnectionState) {
        self.state.send_replace(next);
    }

    /// Connect, forward and reconnect until `cancel` fires.
    pub async fn run(mut self, cancel: CancellationToken) -> ForwarderStats {
        let mut delay = self.backoff.initial_delay;
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            self.set_state(ConnectionState::Connecting);
            tracing::debug!(url = self.client.url(), attempt, "Connecting to notification service");

            let connected = tokio::select! {
                _ = cancel.cancelled() => break,
                result = self.client.connect() => result,
            };

            match connected {
                Ok(mut connection) => {
                    self.set_state(ConnectionState::Connected);
                    self.stats.connections += 1;
                    if attempt > 1 {
                        tracing::info!(attempts = attempt, "Reconnected to notification service");
                    }
                    attempt = 0;
                    delay = self.backoff.initial_delay;

                    if self.forward(&mut connection, &cancel).await {
                        if let Err(e) = connection.close().await {
                            tracing::debug!(error = %e, "Failed to close connection cleanly");
                        }
                        break;
                    }
                    tracing::warn!("Disconnected from notification service");
                }
                Err(e) => {
                    tracing::warn!(error = %e, attempt, "Connection attempt failed");
                }
            }

            self.set_state(ConnectionState::Disconnected);
            tracing::info!(delay_ms = delay.as_millis() as u64, "Reconnecting after backoff");

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }

            delay = next_delay(delay, &self.backoff);
        }

        self.set_state(ConnectionState::Disconnected);
        tracing::info!(
            alerts_rendered = self.stats.alerts_rendered,
            connections = self.stats.connections,
            "Companion stopped"
        );
        self.stats
    }

    /// Pump frames until the connection drops (`false`) or `cancel` fires
    /// (`true`).
    async fn forward(&mut self, connection: &mut PushConnection, cancel: &CancellationToken) -> bool {
        loop {
            let next = tokio::select! {
                _ = cancel.cancelled() => return true,
                next = connection.next_message() => next,
            };

            match next {
                Ok(Some(message)) => {
                    self.handle_message(message).await;
                }
                Ok(None) => return false,
                Err(e) => {
                    tracing::warn!(error = %e, "Push connection error");
                    return false;
                }
            }
        }
    }

    /// Handle one hub frame. Returns `true` if an alert was rendered.
    pub async fn handle_message(&mut self, message: HubMessage) -> bool {
        match message {
            HubMessage::Recent(entries) => {
                if !entries.is_empty() {
                    tracing::info!(
                        count = entries.len(),
                        "Loaded recent notifications (not shown as alerts)"
                    );
                }
                false
            }
            HubMessage::Notification(record) => {
                let Some(alert) = DesktopAlert::from_record(&record) else {
                    tracing::info!(
                        record_id = %record.id,
                        notification_type = %record.kind,
                        "Unknown notification type, not alerting"
                    );
                    return false;
                };

                match self.renderer.render(&alert).await {
                    Ok(()) => {
                        self.stats.alerts_rendered += 1;
                        tracing::info!(
                            record_id = %record.id,
                            count = self.stats.alerts_rendered,
                            title = %alert.title,
                            "Showing alert"
                        );
                        true
                    }
                    Err(e) => {
                        tracing::warn!(record_id = %record.id, error = %e, "Failed to show alert");
                        false
                    }
                }
            }
        }
    }
}
