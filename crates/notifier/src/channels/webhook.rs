//! Chat webhook channel (Slack, Discord, Teams or raw JSON).

use async_trait::async_trait;
use serde_json::{Value, json};

use wager_common::config::{WebhookConfig, WebhookVariant};
use wager_common::summary::BetSummary;
use wager_common::types::{ChannelKind, NotificationRecord};

use super::{ChannelError, ChannelSender, check_status};

/// Posts a short chat message to an incoming-webhook URL.
pub struct WebhookSender {
    client: reqwest::Client,
    config: WebhookConfig,
}

impl WebhookSender {
    pub fn new(client: reqwest::Client, config: WebhookConfig) -> Self {
        Self { client, config }
    }
}

/// Build the request body for a webhook variant.
pub fn build_payload(
    variant: WebhookVariant,
    record: &NotificationRecord,
    summary: &BetSummary,
) -> Result<Value, ChannelError> {
    let payload = match variant {
        WebhookVariant::Slack => json!({ "text": chat_text(summary, "*") }),
        WebhookVariant::Discord => json!({ "content": chat_text(summary, "**") }),
        WebhookVariant::Teams => json!({ "text": chat_text(summary, "") }),
        WebhookVariant::Generic => {
            serde_json::to_value(record).map_err(|e| ChannelError::Build(e.to_string()))?
        }
    };
    Ok(payload)
}

/// Three-line chat message with `bold` as the emphasis marker.
fn chat_text(summary: &BetSummary, bold: &str) -> String {
    let names = match &summary.taker {
        Some(taker) => format!("{bold}{}{bold} vs {bold}{taker}{bold}", summary.creator),
        None => format!("{bold}{}{bold}", summary.creator),
    };
    format!(
        "{} {bold}{}{bold}\n{} • {}\n{}",
        summary.emoji(),
        summary.headline(),
        names,
        summary.amount,
        summary.description
    )
}

#[async_trait]
impl ChannelSender for WebhookSender {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Webhook
    }

    async fn deliver(
        &self,
        record: &NotificationRecord,
        summary: &BetSummary,
    ) -> Result<(), ChannelError> {
        let payload = build_payload(self.config.variant, record, summary)?;
        let response = self
            .client
            .post(&self.config.url)
            .json(&payload)
            .send()
            .await?;
        check_status(response).await
    }
}
