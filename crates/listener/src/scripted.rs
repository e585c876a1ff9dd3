use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::mpsc;

use wager_common::error::AppError;
use wager_common::types::NotificationRecord;

use crate::feed::{ChangeEvent, ChangeSource};

type Batch = Result<Vec<ChangeEvent>, AppError>;

/// Change feed that replays batches pushed through a [`ScriptHandle`].
///
/// Once the script is exhausted and every handle is dropped, `next_batch`
/// waits forever, like an idle subscription.
pub struct ScriptedFeed {
    batches: mpsc::UnboundedReceiver<Batch>,
    closed: Arc<AtomicBool>,
}

/// Producer side of a [`ScriptedFeed`].
#[derive(Clone)]
pub struct ScriptHandle {
    batches: mpsc::UnboundedSender<Batch>,
    closed: Arc<AtomicBool>,
}

impl ScriptedFeed {
    pub fn new() -> (Self, ScriptHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let closed = Arc::new(AtomicBool::new(false));
        (
            Self {
                batches: rx,
                closed: Arc::clone(&closed),
            },
            ScriptHandle {
                batches: tx,
                closed,
            },
        )
    }
}

impl ScriptHandle {
    /// Queue a batch of events.
    pub fn push(&self, events: Vec<ChangeEvent>) {
        let _ = self.batches.send(Ok(events));
    }

    /// Queue a batch where every record is newly added.
    pub fn push_added(&self, records: Vec<NotificationRecord>) {
        self.push(records.into_iter().map(ChangeEvent::added).collect());
    }

    /// Queue a subscription error.
    pub fn push_error(&self, message: impl Into<String>) {
        let _ = self.batches.send(Err(AppError::Feed(message.into())));
    }

    /// Whether the consumer has closed the feed.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChangeSource for ScriptedFeed {
    async fn next_batch(&mut self) -> Result<Vec<ChangeEvent>, AppError> {
        match self.batches.recv().await {
            Some(batch) => batch,
            None => std::future::pending().await,
        }
    }

    async fn close(&mut self) -> Result<(), AppError> {
        self.closed.store(true, Ordering::SeqCst);
        self.batches.close();
        Ok(())
    }
}
