//! Live change feed over Postgres `LISTEN/NOTIFY`.
//!
//! A trigger on `notifications` publishes `{"op": ..., "id": ...}` for every
//! row change. The feed starts with a snapshot of the unprocessed view, then
//! turns each notification into at most one classified change. When the
//! listener connection drops, notifications sent in the meantime are lost, so
//! the next batch is a fresh snapshot reconciled against the mirror.

use async_trait::async_trait;
use serde::Deserialize;
use sqlx::postgres::{PgListener, PgNotification};

use wager_common::error::AppError;
use wager_common::store::{CHANGE_CHANNEL, PgRecordStore};

use crate::feed::{ChangeEvent, ChangeSource, ViewTracker};

/// Payload published by the change trigger.
#[derive(Debug, Deserialize)]
struct RowChange {
    op: String,
    id: String,
}

pub struct PgChangeFeed {
    listener: PgListener,
    store: PgRecordStore,
    tracker: ViewTracker,
    needs_resync: bool,
}

impl PgChangeFeed {
    /// Open the subscription. Failing here is fatal for the caller.
    pub async fn connect(store: PgRecordStore) -> Result<Self, AppError> {
        let mut listener = PgListener::connect_with(store.pool()).await?;
        listener.listen(CHANGE_CHANNEL).await?;

        tracing::info!(channel = CHANGE_CHANNEL, "Listening for notification changes");

        Ok(Self {
            listener,
            store,
            tracker: ViewTracker::new(),
            needs_resync: true,
        })
    }

    async fn resync(&mut self) -> Result<Vec<ChangeEvent>, AppError> {
        let snapshot = self.store.fetch_unprocessed().await?;
        let events = self.tracker.reconcile(snapshot);
        self.needs_resync = false;

        tracing::info!(
            pending = self.tracker.len(),
            changes = events.len(),
            "Unprocessed view synchronised"
        );
        Ok(events)
    }

    async fn apply(&mut self, notification: PgNotification) -> Result<Vec<ChangeEvent>, AppError> {
        let change: RowChange = serde_json::from_str(notification.payload()).map_err(|e| {
            AppError::Feed(format!(
                "malformed change payload '{}': {e}",
                notification.payload()
            ))
        })?;

        let row = if change.op == "DELETE" {
            None
        } else {
            self.store.fetch_by_id(&change.id).await?
        };

        Ok(self.tracker.observe(&change.id, row).into_iter().collect())
    }
}

#[async_trait]
impl ChangeSource for PgChangeFeed {
    async fn next_batch(&mut self) -> Result<Vec<ChangeEvent>, AppError> {
        if self.needs_resync {
            return self.resync().await;
        }

        // `None` means the connection was lost; the next `try_recv`
        // reconnects and re-issues LISTEN.
        let received = match self.listener.try_recv().await {
            Ok(received) => received,
            Err(e) => {
                self.needs_resync = true;
                return Err(e.into());
            }
        };

        match received {
            Some(notification) => {
                // The notification is consumed either way; a failed apply
                // must be recovered from a fresh snapshot.
                let applied = self.apply(notification).await;
                if applied.is_err() {
                    self.needs_resync = true;
                }
                applied
            }
            None => {
                tracing::warn!("Change feed connection lost, resynchronising");
                self.needs_resync = true;
                Ok(Vec::new())
            }
        }
    }

    async fn close(&mut self) -> Result<(), AppError> {
        self.listener.unlisten_all().await?;
        tracing::info!("Change feed subscription cancelled");
        Ok(())
    }
}
