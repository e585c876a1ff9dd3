//! Dispatch coordinator.
//!
//! For one record: push it to the dashboard, run every configured channel
//! sender concurrently, wait for all of them to settle, then mark the record
//! processed. A failed channel never blocks the others or the processed
//! write. A failed processed write leaves the record eligible for
//! redelivery, so every channel must tolerate duplicates.

use std::sync::Arc;

use futures::future::{BoxFuture, join_all};

use wager_common::store::RecordStore;
use wager_common::types::{ChannelKind, DeliveryStatus, DispatchOutcome, NotificationRecord};

use crate::channels::ChannelSender;
use crate::hub::DashboardHub;

/// Outcomes of one fan-out.
#[derive(Debug, Clone)]
pub struct DispatchReport {
    pub record_id: String,
    pub outcomes: Vec<DispatchOutcome>,
    /// `true` if this fan-out performed the processed transition.
    pub marked_processed: bool,
}

impl DispatchReport {
    pub fn outcome(&self, channel: ChannelKind) -> Option<&DispatchOutcome> {
        self.outcomes.iter().find(|o| o.channel == channel)
    }

    pub fn count(&self, status: DeliveryStatus) -> usize {
        self.outcomes.iter().filter(|o| o.status == status).count()
    }
}

pub struct Dispatcher {
    senders: Vec<Arc<dyn ChannelSender>>,
    hub: Arc<DashboardHub>,
    store: Arc<dyn RecordStore>,
}

impl Dispatcher {
    pub fn new(
        senders: Vec<Arc<dyn ChannelSender>>,
        hub: Arc<DashboardHub>,
        store: Arc<dyn RecordStore>,
    ) -> Self {
        Self {
            senders,
            hub,
            store,
        }
    }

    /// Push the record to the dashboard. Unconditional.
    pub async fn announce(&self, record: &NotificationRecord) {
        self.hub.broadcast(record.clone()).await;
    }

    /// Deliver to every channel, wait for all to settle, then mark the
    /// record processed.
    pub async fn fan_out(&self, record: NotificationRecord) -> DispatchReport {
        let record = Arc::new(record);

        let (channels, tasks): (Vec<_>, Vec<_>) = self
            .senders
            .iter()
            .map(|sender| {
                let sender = Arc::clone(sender);
                let record = Arc::clone(&record);
                let channel = sender.kind();
                (channel, tokio::spawn(async move { sender.send(&record).await }))
            })
            .unzip();

        let outcomes: Vec<DispatchOutcome> = channels
            .into_iter()
            .zip(join_all(tasks).await)
            .map(|(channel, joined)| match joined {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::error!(
                        record_id = %record.id,
                        %channel,
                        error = %e,
                        "Channel sender task aborted"
                    );
                    DispatchOutcome::failed(channel, format!("sender task aborted: {e}"))
                }
            })
            .collect();

        let marked_processed = match self.store.mark_processed(&record.id).await {
            Ok(true) => true,
            Ok(false) => {
                tracing::debug!(record_id = %record.id, "Record was already processed");
                false
            }
            Err(e) => {
                tracing::error!(
                    record_id = %record.id,
                    error = %e,
                    "Failed to mark record processed; it will be redelivered"
                );
                false
            }
        };

        let report = DispatchReport {
            record_id: record.id.clone(),
            outcomes,
            marked_processed,
        };

        tracing::info!(
            record_id = %report.record_id,
            sent = report.count(DeliveryStatus::Sent),
            failed = report.count(DeliveryStatus::Failed),
            skipped = report.count(DeliveryStatus::Skipped),
            marked_processed,
            "Fan-out settled"
        );

        report
    }

    /// Announce the record, then hand back its fan-out.
    ///
    /// The broadcast has completed when this returns. Callers spawn the
    /// returned future so the next record is never held up by slow channels.
    pub async fn dispatch(
        self: &Arc<Self>,
        record: NotificationRecord,
    ) -> BoxFuture<'static, DispatchReport> {
        tracing::info!(
            record_id = %record.id,
            notification_type = %record.kind,
            "Processing notification"
        );
        self.announce(&record).await;

        let dispatcher = Arc::clone(self);
        Box::pin(async move { dispatcher.fan_out(record).await })
    }
}
