//! Dispatch coordinator tests over in-memory senders and stores.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use wager_common::error::AppError;
use wager_common::store::RecordStore;
use wager_common::summary::BetSummary;
use wager_common::types::{
    Amount, ChannelKind, DeliveryStatus, NotificationRecord, NotificationType,
};
use wager_notifier::{ChannelError, ChannelSender, DashboardHub, Dispatcher};

// ============================================================================
// Test doubles
// ============================================================================

enum Behaviour {
    Succeed,
    Fail,
    Panic,
}

struct FakeSender {
    kind: ChannelKind,
    behaviour: Behaviour,
    delay: Duration,
    /// Overrides `delay` for specific record ids.
    delay_for: HashMap<String, Duration>,
    calls: AtomicUsize,
    seen: Mutex<Vec<String>>,
}

impl FakeSender {
    fn new(kind: ChannelKind, behaviour: Behaviour) -> Arc<Self> {
        Self::slow(kind, behaviour, Duration::ZERO)
    }

    fn slow(kind: ChannelKind, behaviour: Behaviour, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            kind,
            behaviour,
            delay,
            delay_for: HashMap::new(),
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        })
    }

    fn with_delays(kind: ChannelKind, delays: &[(&str, Duration)]) -> Arc<Self> {
        Arc::new(Self {
            kind,
            behaviour: Behaviour::Succeed,
            delay: Duration::ZERO,
            delay_for: delays
                .iter()
                .map(|(id, delay)| (id.to_string(), *delay))
                .collect(),
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChannelSender for FakeSender {
    fn kind(&self) -> ChannelKind {
        self.kind
    }

    async fn deliver(
        &self,
        record: &NotificationRecord,
        _summary: &BetSummary,
    ) -> Result<(), ChannelError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(record.id.clone());
        let delay = self.delay_for.get(&record.id).copied().unwrap_or(self.delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        match self.behaviour {
            Behaviour::Succeed => Ok(()),
            Behaviour::Fail => Err(ChannelError::HttpStatus {
                status: 503,
                body: "unreachable".to_string(),
            }),
            Behaviour::Panic => panic!("sender blew up"),
        }
    }
}

#[derive(Default)]
struct MemoryStore {
    processed: Mutex<HashMap<String, bool>>,
    fail_writes: bool,
    writes: AtomicUsize,
}

impl MemoryStore {
    fn failing() -> Self {
        Self {
            fail_writes: true,
            ..Default::default()
        }
    }

    fn is_processed(&self, id: &str) -> bool {
        self.processed.lock().unwrap().get(id).copied().unwrap_or(false)
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn mark_processed(&self, id: &str) -> Result<bool, AppError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes {
            return Err(AppError::Internal("store unavailable".to_string()));
        }
        let mut processed = self.processed.lock().unwrap();
        let previous = processed.insert(id.to_string(), true);
        Ok(previous != Some(true))
    }
}

fn record(id: &str, kind: NotificationType) -> NotificationRecord {
    NotificationRecord {
        id: id.to_string(),
        kind,
        bet_id: format!("bet-{id}"),
        bet_description: "Lakers win".to_string(),
        bet_amount: Amount::from_cents(1000),
        creator_name: "Alice".to_string(),
        creator_photo: None,
        taker_name: None,
        taker_photo: None,
        created_at: Utc::now(),
        processed: false,
    }
}

fn dispatcher(
    senders: &[Arc<FakeSender>],
    store: Arc<MemoryStore>,
) -> (Arc<Dispatcher>, Arc<DashboardHub>) {
    let hub = Arc::new(DashboardHub::new());
    let senders: Vec<Arc<dyn ChannelSender>> = senders
        .iter()
        .map(|s| Arc::clone(s) as Arc<dyn ChannelSender>)
        .collect();
    (Arc::new(Dispatcher::new(senders, Arc::clone(&hub), store)), hub)
}

// ============================================================================
// Fan-out
// ============================================================================

#[tokio::test]
async fn test_all_channels_enabled() {
    let webhook = FakeSender::new(ChannelKind::Webhook, Behaviour::Succeed);
    let email = FakeSender::new(ChannelKind::Email, Behaviour::Succeed);
    let telegram = FakeSender::new(ChannelKind::Telegram, Behaviour::Succeed);
    let store = Arc::new(MemoryStore::default());
    let (dispatcher, hub) = dispatcher(
        &[webhook.clone(), email.clone(), telegram.clone()],
        store.clone(),
    );

    let report = dispatcher
        .dispatch(record("n1", NotificationType::BetCreated))
        .await
        .await;

    assert_eq!(webhook.calls(), 1);
    assert_eq!(email.calls(), 1);
    assert_eq!(telegram.calls(), 1);
    assert_eq!(report.count(DeliveryStatus::Sent), 3);
    assert!(report.marked_processed);
    assert!(store.is_processed("n1"));
    assert_eq!(hub.recent().await[0].record.id, "n1");
}

#[tokio::test]
async fn test_failing_channel_is_isolated() {
    let webhook = FakeSender::new(ChannelKind::Webhook, Behaviour::Fail);
    let email = FakeSender::new(ChannelKind::Email, Behaviour::Succeed);
    let telegram = FakeSender::new(ChannelKind::Telegram, Behaviour::Succeed);
    let store = Arc::new(MemoryStore::default());
    let (dispatcher, hub) = dispatcher(
        &[webhook.clone(), email.clone(), telegram.clone()],
        store.clone(),
    );

    let report = dispatcher
        .dispatch(record("n1", NotificationType::BetCreated))
        .await
        .await;

    let failed = report.outcome(ChannelKind::Webhook).unwrap();
    assert_eq!(failed.status, DeliveryStatus::Failed);
    assert!(failed.error_detail.as_deref().unwrap().contains("503"));
    assert_eq!(
        report.outcome(ChannelKind::Email).unwrap().status,
        DeliveryStatus::Sent
    );
    assert_eq!(
        report.outcome(ChannelKind::Telegram).unwrap().status,
        DeliveryStatus::Sent
    );
    assert_eq!(hub.len().await, 1);
    assert!(store.is_processed("n1"));
}

#[tokio::test]
async fn test_panicking_sender_becomes_failure() {
    let broken = FakeSender::new(ChannelKind::Webhook, Behaviour::Panic);
    let email = FakeSender::new(ChannelKind::Email, Behaviour::Succeed);
    let store = Arc::new(MemoryStore::default());
    let (dispatcher, _hub) = dispatcher(&[broken, email.clone()], store.clone());

    let report = dispatcher
        .dispatch(record("n1", NotificationType::BetCreated))
        .await
        .await;

    assert!(report.outcome(ChannelKind::Webhook).unwrap().is_failure());
    assert_eq!(email.calls(), 1);
    assert!(store.is_processed("n1"));
}

#[tokio::test]
async fn test_slow_channel_does_not_delay_others() {
    let slow = FakeSender::slow(
        ChannelKind::Webhook,
        Behaviour::Succeed,
        Duration::from_millis(300),
    );
    let fast = FakeSender::new(ChannelKind::Email, Behaviour::Succeed);
    let store = Arc::new(MemoryStore::default());
    let (dispatcher, _hub) = dispatcher(&[slow.clone(), fast.clone()], store.clone());

    let task = {
        let dispatcher = Arc::clone(&dispatcher);
        tokio::spawn(async move {
            dispatcher
                .dispatch(record("n1", NotificationType::BetCreated))
                .await
                .await
        })
    };

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(fast.calls(), 1);
    assert_eq!(slow.calls(), 1);
    // Processed is only written once every channel has settled.
    assert!(!store.is_processed("n1"));

    let report = task.await.unwrap();
    assert_eq!(report.count(DeliveryStatus::Sent), 2);
    assert!(store.is_processed("n1"));
}

#[tokio::test]
async fn test_unknown_type_skipped_everywhere() {
    let webhook = FakeSender::new(ChannelKind::Webhook, Behaviour::Succeed);
    let store = Arc::new(MemoryStore::default());
    let (dispatcher, hub) = dispatcher(&[webhook.clone()], store.clone());

    let report = dispatcher
        .dispatch(record("n1", NotificationType::from("bet_voided")))
        .await
        .await;

    assert_eq!(webhook.calls(), 0);
    assert_eq!(report.count(DeliveryStatus::Skipped), 1);
    assert_eq!(report.count(DeliveryStatus::Failed), 0);
    assert_eq!(hub.len().await, 1);
    assert!(store.is_processed("n1"));
}

// ============================================================================
// Processed flag and redelivery
// ============================================================================

#[tokio::test]
async fn test_failed_processed_write_allows_redelivery() {
    let webhook = FakeSender::new(ChannelKind::Webhook, Behaviour::Succeed);
    let email = FakeSender::new(ChannelKind::Email, Behaviour::Succeed);
    let store = Arc::new(MemoryStore::failing());
    let (dispatcher, hub) = dispatcher(&[webhook.clone(), email.clone()], store.clone());

    let first = dispatcher
        .dispatch(record("n1", NotificationType::BetCreated))
        .await
        .await;
    assert!(!first.marked_processed);
    assert!(!store.is_processed("n1"));

    // Redelivery is sent again to every channel.
    let second = dispatcher
        .dispatch(record("n1", NotificationType::BetCreated))
        .await
        .await;
    assert_eq!(second.count(DeliveryStatus::Sent), 2);
    assert_eq!(webhook.calls(), 2);
    assert_eq!(email.calls(), 2);
    assert_eq!(store.writes.load(Ordering::SeqCst), 2);
    assert_eq!(hub.len().await, 2);
}

#[tokio::test]
async fn test_second_processed_write_is_a_noop() {
    let store = Arc::new(MemoryStore::default());
    let (dispatcher, _hub) = dispatcher(&[], store.clone());

    assert!(dispatcher.fan_out(record("n1", NotificationType::BetCreated)).await.marked_processed);
    assert!(!dispatcher.fan_out(record("n1", NotificationType::BetCreated)).await.marked_processed);
    assert!(store.is_processed("n1"));
}

// ============================================================================
// Ordering
// ============================================================================

#[tokio::test]
async fn test_buffer_follows_arrival_order() {
    // n1's channel is much slower than n2's.
    let sender = FakeSender::with_delays(
        ChannelKind::Webhook,
        &[
            ("n1", Duration::from_millis(300)),
            ("n2", Duration::from_millis(10)),
        ],
    );
    let store = Arc::new(MemoryStore::default());
    let (dispatcher, hub) = dispatcher(&[sender.clone()], store.clone());

    let mut tasks = Vec::new();
    for id in ["n1", "n2"] {
        let fan_out = dispatcher
            .dispatch(record(id, NotificationType::BetCreated))
            .await;
        tasks.push(tokio::spawn(fan_out));
    }

    // n2 settles while n1 is still in flight.
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(store.is_processed("n2"));
    assert!(!store.is_processed("n1"));

    for task in tasks {
        task.await.unwrap();
    }

    let ids: Vec<String> = hub.recent().await.into_iter().map(|e| e.record.id).collect();
    assert_eq!(ids, vec!["n2", "n1"]);
    assert!(store.is_processed("n1"));
    assert_eq!(sender.seen.lock().unwrap().len(), 2);
}
