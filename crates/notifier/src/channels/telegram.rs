//! Telegram Bot API channel.

use async_trait::async_trait;
use serde_json::json;

use wager_common::config::TelegramConfig;
use wager_common::summary::BetSummary;
use wager_common::types::{ChannelKind, NotificationRecord};

use super::{ChannelError, ChannelSender, check_status};

/// Sends a Markdown message through `sendMessage`.
pub struct TelegramSender {
    client: reqwest::Client,
    config: TelegramConfig,
}

impl TelegramSender {
    pub fn new(client: reqwest::Client, config: TelegramConfig) -> Self {
        Self { client, config }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/bot{}/sendMessage",
            self.config.api_base, self.config.bot_token
        )
    }
}

/// Escape the characters legacy Markdown treats as markup.
pub fn escape_markdown(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '_' | '*' | '`' | '[') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

pub(crate) fn render_message(summary: &BetSummary) -> String {
    let mut text = format!(
        "{} *{}*\n\n*Creator:* {}\n",
        summary.emoji(),
        summary.headline(),
        escape_markdown(&summary.creator)
    );
    if let Some(taker) = &summary.taker {
        text.push_str(&format!("*Taker:* {}\n", escape_markdown(taker)));
    }
    text.push_str(&format!(
        "*Amount:* {}\n\n{}",
        summary.amount,
        escape_markdown(&summary.description)
    ));
    text
}

#[async_trait]
impl ChannelSender for TelegramSender {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Telegram
    }

    async fn deliver(
        &self,
        _record: &NotificationRecord,
        summary: &BetSummary,
    ) -> Result<(), ChannelError> {
        let payload = json!({
            "chat_id": self.config.chat_id,
            "text": render_message(summary),
            "parse_mode": "Markdown",
        });

        let response = self
            .client
            .post(self.endpoint())
            .json(&payload)
            .send()
            .await?;
        check_status(response).await
    }
}
