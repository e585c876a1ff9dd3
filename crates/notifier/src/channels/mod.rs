//! Delivery channels.
//!
//! - Chat webhooks (Slack, Discord, Teams, raw JSON)
//! - Email (SMTP)
//! - Telegram Bot API
//! - Custom HTTP callback

mod custom;
mod email;
mod telegram;
mod webhook;

pub use custom::CustomWebhookSender;
pub use email::EmailSender;
pub use telegram::{TelegramSender, escape_markdown};
pub use webhook::{WebhookSender, build_payload};

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use wager_common::config::ChannelsConfig;
use wager_common::error::AppError;
use wager_common::summary::BetSummary;
use wager_common::types::{ChannelKind, DispatchOutcome, NotificationRecord};

/// Error raised inside a single delivery attempt.
///
/// Never crosses [`ChannelSender::send`]; it is folded into a failed
/// [`DispatchOutcome`] there.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// The underlying HTTP request failed (network, DNS, timeout, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The remote server returned a non-2xx status code.
    #[error("HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("SMTP error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    #[error("Invalid email address: {0}")]
    Address(#[from] lettre::address::AddressError),

    #[error("Failed to build request: {0}")]
    Build(String),
}

/// A delivery adapter for one channel.
#[async_trait]
pub trait ChannelSender: Send + Sync {
    /// Which channel this sender delivers to.
    fn kind(&self) -> ChannelKind;

    /// Perform one delivery attempt for a record with a known type.
    async fn deliver(
        &self,
        record: &NotificationRecord,
        summary: &BetSummary,
    ) -> Result<(), ChannelError>;

    /// Deliver a record and report the outcome. Never fails.
    ///
    /// Records of an unknown type are logged and skipped.
    async fn send(&self, record: &NotificationRecord) -> DispatchOutcome {
        let channel = self.kind();

        let Some(summary) = BetSummary::from_record(record) else {
            tracing::info!(
                record_id = %record.id,
                %channel,
                notification_type = %record.kind,
                "Unknown notification type, skipping"
            );
            return DispatchOutcome::skipped(channel);
        };

        match self.deliver(record, &summary).await {
            Ok(()) => {
                tracing::info!(record_id = %record.id, %channel, "Notification delivered");
                DispatchOutcome::sent(channel)
            }
            Err(e) => {
                tracing::warn!(
                    record_id = %record.id,
                    %channel,
                    error = %e,
                    "Notification delivery failed"
                );
                DispatchOutcome::failed(channel, e.to_string())
            }
        }
    }
}

/// Build a sender for every enabled channel.
///
/// HTTP senders share one client whose request timeout is the only timeout
/// in the fan-out path.
pub fn build_senders(config: &ChannelsConfig) -> Result<Vec<Arc<dyn ChannelSender>>, AppError> {
    let client = reqwest::Client::builder()
        .timeout(config.timeout)
        .build()
        .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {e}")))?;

    let mut senders: Vec<Arc<dyn ChannelSender>> = Vec::new();

    if let Some(webhook) = &config.webhook {
        senders.push(Arc::new(WebhookSender::new(client.clone(), webhook.clone())));
    }

    if let Some(email) = &config.email {
        let sender = EmailSender::new(email, config.timeout)
            .map_err(|e| AppError::Config(format!("Email channel: {e}")))?;
        senders.push(Arc::new(sender));
    }

    if let Some(telegram) = &config.telegram {
        senders.push(Arc::new(TelegramSender::new(client.clone(), telegram.clone())));
    }

    if let Some(custom) = &config.custom_webhook {
        let sender = CustomWebhookSender::new(client.clone(), custom)
            .map_err(|e| AppError::Config(format!("Custom webhook channel: {e}")))?;
        senders.push(Arc::new(sender));
    }

    for sender in &senders {
        tracing::info!(channel = %sender.kind(), "Channel enabled");
    }

    Ok(senders)
}

/// Turn a non-2xx response into [`ChannelError::HttpStatus`].
pub(crate) async fn check_status(response: reqwest::Response) -> Result<(), ChannelError> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    let body = response.text().await.unwrap_or_default();
    Err(ChannelError::HttpStatus {
        status: status.as_u16(),
        body,
    })
}
