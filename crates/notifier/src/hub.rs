//! Live dashboard hub.
//!
//! Keeps the most recent dispatched records (newest first) and pushes each
//! new one to every connected viewer. Viewers that fall behind skip what
//! they missed; nothing is acknowledged and nothing is persisted.

use std::collections::VecDeque;

use tokio::sync::{RwLock, broadcast};

use wager_common::types::{DashboardEntry, NotificationRecord};

/// Number of entries kept for replay to new viewers.
pub const DASHBOARD_CAPACITY: usize = 100;

/// Per-viewer backlog before a slow viewer starts lagging.
const CHANNEL_CAPACITY: usize = 256;

pub struct DashboardHub {
    buffer: RwLock<VecDeque<DashboardEntry>>,
    capacity: usize,
    sender: broadcast::Sender<NotificationRecord>,
}

impl DashboardHub {
    pub fn new() -> Self {
        Self::with_capacity(DASHBOARD_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            buffer: RwLock::new(VecDeque::with_capacity(capacity + 1)),
            capacity,
            sender,
        }
    }

    /// Insert a record at the head of the buffer and push it to viewers.
    ///
    /// Returns the number of viewers the record was pushed to.
    pub async fn broadcast(&self, record: NotificationRecord) -> usize {
        let mut buffer = self.buffer.write().await;
        buffer.push_front(DashboardEntry::new(record.clone()));
        buffer.truncate(self.capacity);

        // Err only means nobody is watching.
        let viewers = self.sender.send(record).unwrap_or(0);

        tracing::debug!(buffered = buffer.len(), viewers, "Dashboard broadcast");
        viewers
    }

    /// Register a viewer.
    ///
    /// The snapshot and the receiver are taken under the same lock
    /// `broadcast` writes under, so every record reaches the viewer exactly
    /// once: either in the snapshot or through the receiver.
    pub async fn subscribe(
        &self,
    ) -> (
        Vec<DashboardEntry>,
        broadcast::Receiver<NotificationRecord>,
    ) {
        let buffer = self.buffer.read().await;
        let receiver = self.sender.subscribe();
        (buffer.iter().cloned().collect(), receiver)
    }

    /// Current buffer, newest first.
    pub async fn recent(&self) -> Vec<DashboardEntry> {
        self.buffer.read().await.iter().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.buffer.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.buffer.read().await.is_empty()
    }

    /// Number of currently subscribed viewers.
    pub fn viewer_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for DashboardHub {
    fn default() -> Self {
        Self::new()
    }
}
