use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

use wager_common::config::CustomWebhookConfig;
use wager_common::summary::BetSummary;
use wager_common::types::{ChannelKind, NotificationRecord};

use super::{ChannelError, ChannelSender, check_status};

/// Posts the raw record JSON to a user-supplied callback URL.
pub struct CustomWebhookSender {
    client: reqwest::Client,
    url: String,
    headers: HeaderMap,
}

impl CustomWebhookSender {
    /// Fails if a configured header name or value is not valid HTTP.
    pub fn new(client: reqwest::Client, config: &CustomWebhookConfig) -> Result<Self, ChannelError> {
        let mut headers = HeaderMap::new();
        for (name, value) in &config.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| ChannelError::Build(format!("header name '{name}': {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| ChannelError::Build(format!("header value for '{name}': {e}")))?;
            headers.insert(name, value);
        }

        Ok(Self {
            client,
            url: config.url.clone(),
            headers,
        })
    }
}

#[async_trait]
impl ChannelSender for CustomWebhookSender {
    fn kind(&self) -> ChannelKind {
        ChannelKind::CustomWebhook
    }

    async fn deliver(
        &self,
        record: &NotificationRecord,
        _summary: &BetSummary,
    ) -> Result<(), ChannelError> {
        let response = self
            .client
            .post(&self.url)
            .headers(self.headers.clone())
            .json(record)
            .send()
            .await?;
        check_status(response).await
    }
}
