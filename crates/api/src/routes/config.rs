//! Channel configuration summary for dashboards.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use wager_common::config::ChannelsConfig;

use crate::state::AppState;

/// Which channels are enabled. Secrets are never exposed.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelFlags {
    pub webhook: bool,
    pub email: bool,
    pub telegram: bool,
    pub custom_webhook: bool,
    pub web_dashboard: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigResponse {
    pub channels: ChannelFlags,
    /// Webhook variant, or `none` when the webhook channel is disabled.
    pub webhook_type: String,
}

impl From<&ChannelsConfig> for ConfigResponse {
    fn from(channels: &ChannelsConfig) -> Self {
        Self {
            channels: ChannelFlags {
                webhook: channels.webhook.is_some(),
                email: channels.email.is_some(),
                telegram: channels.telegram.is_some(),
                custom_webhook: channels.custom_webhook.is_some(),
                web_dashboard: true,
            },
            webhook_type: channels
                .webhook
                .as_ref()
                .map(|w| w.variant.as_str())
                .unwrap_or("none")
                .to_string(),
        }
    }
}

pub fn router() -> Router<AppState> {
    Router::new().route("/api/config", get(get_config))
}

/// GET /api/config: Enabled channels and webhook variant.
async fn get_config(State(state): State<AppState>) -> Json<ConfigResponse> {
    Json(ConfigResponse::from(&state.config.channels))
}
