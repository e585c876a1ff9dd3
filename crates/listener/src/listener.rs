use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use wager_common::types::NotificationRecord;
use wager_notifier::Dispatcher;

use crate::feed::{ChangeKind, ChangeSource};

/// Pause after a failed batch before asking the source again.
const ERROR_PAUSE: Duration = Duration::from_secs(1);

/// Counters reported when the listener stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListenerStats {
    pub batches: u64,
    pub dispatched: u64,
    pub ignored: u64,
    pub errors: u64,
}

/// Pulls change batches and hands every newly added record to the
/// dispatcher.
///
/// Dashboard broadcasts happen inline, in arrival order. Channel fan-outs run
/// as tracked background tasks so a slow channel never holds up the next
/// batch.
pub struct ChangeFeedListener {
    source: Box<dyn ChangeSource>,
    dispatcher: Arc<Dispatcher>,
    tasks: TaskTracker,
    error_pause: Duration,
    stats: ListenerStats,
}

impl ChangeFeedListener {
    pub fn new(source: Box<dyn ChangeSource>, dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            source,
            dispatcher,
            tasks: TaskTracker::new(),
            error_pause: ERROR_PAUSE,
            stats: ListenerStats::default(),
        }
    }

    pub fn with_error_pause(mut self, pause: Duration) -> Self {
        self.error_pause = pause;
        self
    }

    /// Run until `cancel` fires, then close the source and wait for
    /// in-flight fan-outs.
    pub async fn run(mut self, cancel: CancellationToken) -> ListenerStats {
        tracing::info!("Change-feed listener started");

        loop {
            let batch = tokio::select! {
                _ = cancel.cancelled() => None,
                batch = self.source.next_batch() => Some(batch),
            };
            let Some(batch) = batch else { break };

            match batch {
                Ok(events) => {
                    self.stats.batches += 1;
                    for event in events {
                        match event.kind {
                            ChangeKind::Added => self.dispatch(event.record).await,
                            ChangeKind::Modified | ChangeKind::Removed => {
                                tracing::debug!(
                                    record_id = %event.record.id,
                                    kind = ?event.kind,
                                    "Ignoring change"
                                );
                                self.stats.ignored += 1;
                            }
                        }
                    }
                }
                Err(e) => {
                    self.stats.errors += 1;
                    tracing::error!(error = %e, "Change feed error, continuing");
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(self.error_pause) => {}
                    }
                }
            }
        }

        tracing::info!("Shutdown signal received, cancelling subscription");
        if let Err(e) = self.source.close().await {
            tracing::warn!(error = %e, "Failed to cancel change feed subscription");
        }

        self.tasks.close();
        if !self.tasks.is_empty() {
            tracing::info!(in_flight = self.tasks.len(), "Waiting for in-flight fan-outs");
        }
        self.tasks.wait().await;

        tracing::info!(
            batches = self.stats.batches,
            dispatched = self.stats.dispatched,
            ignored = self.stats.ignored,
            errors = self.stats.errors,
            "Change-feed listener stopped"
        );
        self.stats
    }

    async fn dispatch(&mut self, record: NotificationRecord) {
        self.stats.dispatched += 1;
        let fan_out = self.dispatcher.dispatch(record).await;
        self.tasks.spawn(fan_out);
    }
}
