//! Forwarder tests against an in-process push endpoint.
//!
//! The double speaks the same frames as the notifier: a `recent` replay on
//! connect followed by live `notification` frames.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use axum::routing::get;
use chrono::Utc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use wager_common::types::{Amount, DashboardEntry, HubMessage, NotificationRecord, NotificationType};
use wager_companion::alert::AlertError;
use wager_companion::{
    AlertRenderer, BackoffConfig, ConnectionState, DesktopAlert, Forwarder, PushClient,
};

// ============================================================
// Helpers
// ============================================================

#[derive(Default)]
struct Recorder {
    shown: Mutex<Vec<DesktopAlert>>,
}

impl Recorder {
    fn messages(&self) -> Vec<String> {
        self.shown
            .lock()
            .unwrap()
            .iter()
            .map(|a| a.message.clone())
            .collect()
    }
}

#[async_trait]
impl AlertRenderer for Recorder {
    async fn render(&self, alert: &DesktopAlert) -> Result<(), AlertError> {
        self.shown.lock().unwrap().push(alert.clone());
        Ok(())
    }
}

fn record(id: &str, description: &str) -> NotificationRecord {
    NotificationRecord {
        id: id.to_string(),
        kind: NotificationType::BetCreated,
        bet_id: format!("bet-{id}"),
        bet_description: description.to_string(),
        bet_amount: Amount::from_cents(2500),
        creator_name: "Alice".to_string(),
        creator_photo: None,
        taker_name: None,
        taker_photo: None,
        created_at: Utc::now(),
        processed: false,
    }
}

fn fast_backoff() -> BackoffConfig {
    BackoffConfig {
        initial_delay: Duration::from_millis(20),
        max_delay: Duration::from_millis(100),
        multiplier: 2.0,
    }
}

/// How the push double behaves once the replay is sent.
#[derive(Clone, Copy)]
enum Script {
    /// Send one live frame, then drop the connection.
    LiveThenDrop,
    /// Stay open until the client closes.
    Hold,
}

#[derive(Clone)]
struct Double {
    script: Script,
    connections: Arc<AtomicUsize>,
    closed_by_client: mpsc::UnboundedSender<()>,
}

async fn push_handler(ws: WebSocketUpgrade, State(double): State<Double>) -> Response {
    ws.on_upgrade(move |socket| run_double(socket, double))
}

async fn send(socket: &mut WebSocket, message: &HubMessage) -> bool {
    let text = serde_json::to_string(message).unwrap();
    socket.send(Message::Text(text.into())).await.is_ok()
}

async fn run_double(mut socket: WebSocket, double: Double) {
    let n = double.connections.fetch_add(1, Ordering::SeqCst) + 1;

    let backlog = vec![DashboardEntry::new(record("old", "backlog"))];
    if !send(&mut socket, &HubMessage::Recent(backlog)).await {
        return;
    }

    match double.script {
        Script::LiveThenDrop => {
            let live = record(&format!("live-{n}"), &format!("live {n}"));
            send(&mut socket, &HubMessage::Notification(live)).await;
        }
        Script::Hold => {
            while let Some(Ok(frame)) = socket.recv().await {
                if matches!(frame, Message::Close(_)) {
                    let _ = double.closed_by_client.send(());
                    break;
                }
            }
        }
    }
}

/// Serve the double on an ephemeral port and return its base URL.
async fn serve(script: Script) -> (String, Arc<AtomicUsize>, mpsc::UnboundedReceiver<()>) {
    let connections = Arc::new(AtomicUsize::new(0));
    let (closed_tx, closed_rx) = mpsc::unbounded_channel();
    let double = Double {
        script,
        connections: Arc::clone(&connections),
        closed_by_client: closed_tx,
    };

    let app = Router::new()
        .route("/ws", get(push_handler))
        .with_state(double);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{addr}"), connections, closed_rx)
}

async fn wait_until(mut check: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

// ============================================================
// Forwarding
// ============================================================

#[tokio::test]
async fn test_only_live_frames_become_alerts() {
    let (url, connections, _closed) = serve(Script::LiveThenDrop).await;
    let recorder = Arc::new(Recorder::default());
    let forwarder = Forwarder::new(
        PushClient::new(&url).unwrap(),
        Arc::clone(&recorder) as Arc<dyn AlertRenderer>,
        fast_backoff(),
    );

    let cancel = CancellationToken::new();
    let handle = tokio::spawn(forwarder.run(cancel.clone()));

    // Every connection replays the backlog; only the live frames are shown.
    wait_until(|| recorder.messages().len() >= 2).await;
    cancel.cancel();
    let stats = handle.await.unwrap();

    let messages = recorder.messages();
    assert!(messages.iter().all(|m| m.starts_with("live ")));
    assert!(!messages.iter().any(|m| m.contains("backlog")));
    assert_eq!(messages[0], "live 1");
    assert_eq!(messages[1], "live 2");
    assert!(stats.connections >= 2);
    assert!(connections.load(Ordering::SeqCst) >= 2);
    assert_eq!(stats.alerts_rendered as usize, messages.len());
}

// ============================================================
// Reconnect
// ============================================================

#[tokio::test]
async fn test_reconnects_once_server_appears() {
    // Reserve a port, release it, and start the server there later.
    let probe = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = probe.local_addr().unwrap();
    drop(probe);

    let recorder = Arc::new(Recorder::default());
    let forwarder = Forwarder::new(
        PushClient::new(&format!("http://{addr}")).unwrap(),
        Arc::clone(&recorder) as Arc<dyn AlertRenderer>,
        fast_backoff(),
    );
    let mut state = forwarder.subscribe_state();

    let cancel = CancellationToken::new();
    let handle = tokio::spawn(forwarder.run(cancel.clone()));

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(recorder.messages().is_empty());

    let (closed_tx, _closed_rx) = mpsc::unbounded_channel();
    let double = Double {
        script: Script::Hold,
        connections: Arc::new(AtomicUsize::new(0)),
        closed_by_client: closed_tx,
    };
    let app = Router::new()
        .route("/ws", get(push_handler))
        .with_state(double);
    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    tokio::time::timeout(
        Duration::from_secs(5),
        state.wait_for(|s| *s == ConnectionState::Connected),
    )
    .await
    .unwrap()
    .unwrap();

    cancel.cancel();
    let stats = handle.await.unwrap();
    assert_eq!(stats.connections, 1);
    assert_eq!(stats.alerts_rendered, 0);
}

// ============================================================
// Shutdown
// ============================================================

#[tokio::test]
async fn test_cancel_closes_connection() {
    let (url, connections, mut closed) = serve(Script::Hold).await;
    let recorder = Arc::new(Recorder::default());
    let forwarder = Forwarder::new(
        PushClient::new(&url).unwrap(),
        recorder as Arc<dyn AlertRenderer>,
        fast_backoff(),
    );
    let mut state = forwarder.subscribe_state();

    let cancel = CancellationToken::new();
    let handle = tokio::spawn(forwarder.run(cancel.clone()));

    tokio::time::timeout(
        Duration::from_secs(5),
        state.wait_for(|s| *s == ConnectionState::Connected),
    )
    .await
    .unwrap()
    .unwrap();
    drop(state);

    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(5), closed.recv())
        .await
        .expect("server never saw a close frame")
        .unwrap();

    let stats = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stats.connections, 1);
    assert_eq!(connections.load(Ordering::SeqCst), 1);
}
