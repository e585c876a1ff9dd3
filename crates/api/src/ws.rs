//! Dashboard push endpoint.
//!
//! Each viewer gets one `recent` frame with the current buffer, then one
//! `notification` frame per broadcast. Viewers never send application
//! messages; inbound frames are only watched for close.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::State;
use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade, close_code};
use axum::response::IntoResponse;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;

use wager_common::types::HubMessage;
use wager_notifier::DashboardHub;

use crate::state::AppState;

/// Interval between keep-alive pings.
const PING_INTERVAL: Duration = Duration::from_secs(30);

/// GET /ws: Upgrade to a dashboard push connection.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state.hub, state.shutdown))
}

async fn handle_socket(socket: WebSocket, hub: Arc<DashboardHub>, shutdown: CancellationToken) {
    let conn_id = uuid::Uuid::new_v4().to_string();
    let (recent, mut live) = hub.subscribe().await;

    tracing::info!(
        conn_id = %conn_id,
        buffered = recent.len(),
        viewers = hub.viewer_count(),
        "Dashboard viewer connected"
    );

    let (mut sink, mut stream) = socket.split();

    if let Err(e) = send_frame(&mut sink, &HubMessage::Recent(recent)).await {
        tracing::debug!(conn_id = %conn_id, error = %e, "Failed to send recent notifications");
        return;
    }

    let mut ping = tokio::time::interval(PING_INTERVAL);
    ping.tick().await;

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                let close = Message::Close(Some(CloseFrame {
                    code: close_code::AWAY,
                    reason: "server shutting down".into(),
                }));
                let _ = sink.send(close).await;
                break;
            }
            received = live.recv() => match received {
                Ok(record) => {
                    if send_frame(&mut sink, &HubMessage::Notification(record)).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(conn_id = %conn_id, skipped, "Dashboard viewer lagging, notifications skipped");
                }
                Err(RecvError::Closed) => break,
            },
            _ = ping.tick() => {
                if sink.send(Message::Ping(Bytes::new())).await.is_err() {
                    break;
                }
            }
            inbound = stream.next() => match inbound {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::debug!(conn_id = %conn_id, error = %e, "WebSocket receive error");
                    break;
                }
            },
        }
    }

    drop(live);
    tracing::info!(
        conn_id = %conn_id,
        viewers = hub.viewer_count(),
        "Dashboard viewer disconnected"
    );
}

async fn send_frame(
    sink: &mut SplitSink<WebSocket, Message>,
    message: &HubMessage,
) -> Result<(), axum::Error> {
    let text = serde_json::to_string(message).map_err(axum::Error::new)?;
    sink.send(Message::Text(text.into())).await
}
