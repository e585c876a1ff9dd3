//! WebSocket client for the notifier's push endpoint.

use std::time::Duration;

use futures::StreamExt;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use wager_common::types::HubMessage;

const CLOSE_GRACE: Duration = Duration::from_secs(2);

/// Errors that can occur when working with the push client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Failed to establish the WebSocket connection.
    #[error("Connection error: {0}")]
    Connection(String),

    /// A protocol-level error on an already-established connection.
    #[error("Protocol error: {0}")]
    Protocol(String),
}

/// Map a notifier base URL to its push endpoint.
///
/// `http://host:5005` becomes `ws://host:5005/ws`, `https` becomes `wss`.
pub fn push_url(notifier_url: &str) -> Result<String, ClientError> {
    let trimmed = notifier_url.trim().trim_end_matches('/');
    let (scheme, rest) = trimmed
        .split_once("://")
        .ok_or_else(|| ClientError::Connection(format!("invalid notifier URL '{notifier_url}'")))?;

    let ws_scheme = match scheme.to_ascii_lowercase().as_str() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(ClientError::Connection(format!(
                "unsupported scheme '{other}' in notifier URL"
            )));
        }
    };

    if rest.is_empty() {
        return Err(ClientError::Connection(format!(
            "invalid notifier URL '{notifier_url}'"
        )));
    }

    let rest = rest.strip_suffix("/ws").unwrap_or(rest);
    Ok(format!("{ws_scheme}://{rest}/ws"))
}

/// Connection settings for one notifier.
#[derive(Debug, Clone)]
pub struct PushClient {
    url: String,
}

impl PushClient {
    pub fn new(notifier_url: &str) -> Result<Self, ClientError> {
        Ok(Self {
            url: push_url(notifier_url)?,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn connect(&self) -> Result<PushConnection, ClientError> {
        let (stream, _response) = connect_async(self.url.as_str())
            .await
            .map_err(|e| ClientError::Connection(format!("Failed to connect to {}: {e}", self.url)))?;

        tracing::info!(url = %self.url, "Connected to notification service");
        Ok(PushConnection { stream })
    }
}

/// A live push connection.
pub struct PushConnection {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl PushConnection {
    /// Next hub frame, or `None` once the server has closed the connection.
    ///
    /// Control frames are handled by the socket; unparseable text frames are
    /// logged and skipped.
    pub async fn next_message(&mut self) -> Result<Option<HubMessage>, ClientError> {
        while let Some(frame) = self.stream.next().await {
            match frame.map_err(|e| ClientError::Protocol(e.to_string()))? {
                Message::Text(text) => match serde_json::from_str::<HubMessage>(&text) {
                    Ok(message) => return Ok(Some(message)),
                    Err(e) => {
                        tracing::warn!(error = %e, "Ignoring unrecognised frame");
                    }
                },
                Message::Close(_) => return Ok(None),
                _ => {}
            }
        }
        Ok(None)
    }

    /// Send a Close frame and briefly wait for the acknowledgement.
    pub async fn close(&mut self) -> Result<(), ClientError> {
        self.stream
            .close(None)
            .await
            .map_err(|e| ClientError::Protocol(e.to_string()))?;
        // Give the server a moment to acknowledge the close.
        let drain = async { while let Some(Ok(_)) = self.stream.next().await {} };
        let _ = tokio::time::timeout(CLOSE_GRACE, drain).await;
        Ok(())
    }
}
