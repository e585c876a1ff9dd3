use std::collections::{HashMap, HashSet};

use async_trait::async_trait;

use wager_common::error::AppError;
use wager_common::types::NotificationRecord;

/// How a record's membership in the unprocessed view changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// The record entered the view.
    Added,
    /// The record changed while staying in the view.
    Modified,
    /// The record left the view (processed or deleted).
    Removed,
}

/// One classified change from the upstream store.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub record: NotificationRecord,
}

impl ChangeEvent {
    pub fn added(record: NotificationRecord) -> Self {
        Self {
            kind: ChangeKind::Added,
            record,
        }
    }

    pub fn modified(record: NotificationRecord) -> Self {
        Self {
            kind: ChangeKind::Modified,
            record,
        }
    }

    pub fn removed(record: NotificationRecord) -> Self {
        Self {
            kind: ChangeKind::Removed,
            record,
        }
    }
}

/// A subscription to the unprocessed records, ordered by creation time.
#[async_trait]
pub trait ChangeSource: Send {
    /// Wait for the next batch of changes. An empty batch is allowed.
    async fn next_batch(&mut self) -> Result<Vec<ChangeEvent>, AppError>;

    /// Cancel the subscription.
    async fn close(&mut self) -> Result<(), AppError>;
}

/// Mirror of the `processed = false` view used to classify row changes.
///
/// A record that has been reported as added stays in the mirror until it
/// leaves the view, so it is never reported as added twice.
#[derive(Debug, Default)]
pub struct ViewTracker {
    view: HashMap<String, NotificationRecord>,
}

impl ViewTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Classify one row observation. `None` means the row no longer exists.
    pub fn observe(&mut self, id: &str, row: Option<NotificationRecord>) -> Option<ChangeEvent> {
        match row {
            Some(record) if !record.processed => {
                match self.view.insert(id.to_string(), record.clone()) {
                    None => Some(ChangeEvent::added(record)),
                    Some(known) if known != record => Some(ChangeEvent::modified(record)),
                    Some(_) => None,
                }
            }
            Some(record) => self
                .view
                .remove(id)
                .map(|_| ChangeEvent::removed(record)),
            None => self.view.remove(id).map(ChangeEvent::removed),
        }
    }

    /// Classify a full snapshot of the view.
    ///
    /// Records already in the mirror are not re-added. Records missing from
    /// the snapshot are reported as removed.
    pub fn reconcile(&mut self, snapshot: Vec<NotificationRecord>) -> Vec<ChangeEvent> {
        let present: HashSet<String> = snapshot.iter().map(|r| r.id.clone()).collect();

        let mut gone: Vec<String> = self
            .view
            .keys()
            .filter(|id| !present.contains(*id))
            .cloned()
            .collect();
        gone.sort();

        let mut events: Vec<ChangeEvent> = snapshot
            .into_iter()
            .filter_map(|record| {
                let id = record.id.clone();
                self.observe(&id, Some(record))
            })
            .collect();

        events.extend(gone.iter().filter_map(|id| self.observe(id, None)));
        events
    }

    pub fn contains(&self, id: &str) -> bool {
        self.view.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.view.len()
    }

    pub fn is_empty(&self) -> bool {
        self.view.is_empty()
    }
}
