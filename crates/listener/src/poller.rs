use std::time::Duration;

use async_trait::async_trait;

use wager_common::error::AppError;
use wager_common::store::PgRecordStore;

use crate::feed::{ChangeEvent, ChangeSource, ViewTracker};

/// Change feed that re-queries the unprocessed view on a fixed interval.
///
/// Used where `LISTEN/NOTIFY` is unavailable (e.g. behind a transaction-mode
/// connection pooler).
pub struct PollingFeed {
    store: PgRecordStore,
    poll_interval: Duration,
    tracker: ViewTracker,
    first_poll: bool,
}

impl PollingFeed {
    pub fn new(store: PgRecordStore, poll_interval_ms: u64) -> Self {
        Self {
            store,
            poll_interval: Duration::from_millis(poll_interval_ms),
            tracker: ViewTracker::new(),
            first_poll: true,
        }
    }
}

#[async_trait]
impl ChangeSource for PollingFeed {
    async fn next_batch(&mut self) -> Result<Vec<ChangeEvent>, AppError> {
        if self.first_poll {
            tracing::info!(
                poll_interval_ms = self.poll_interval.as_millis() as u64,
                "Polling for notification changes"
            );
            self.first_poll = false;
        } else {
            tokio::time::sleep(self.poll_interval).await;
        }

        let snapshot = self.store.fetch_unprocessed().await?;
        Ok(self.tracker.reconcile(snapshot))
    }

    async fn close(&mut self) -> Result<(), AppError> {
        Ok(())
    }
}
