use std::collections::BTreeMap;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Chat webhook payload flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WebhookVariant {
    /// `{"text": ...}` with `*bold*` markup.
    Slack,
    /// `{"content": ...}` with `**bold**` markup.
    Discord,
    /// `{"text": ...}` in plain text.
    Teams,
    /// The raw notification record as JSON.
    Generic,
}

impl WebhookVariant {
    pub fn as_str(&self) -> &'static str {
        match self {
            WebhookVariant::Slack => "slack",
            WebhookVariant::Discord => "discord",
            WebhookVariant::Teams => "teams",
            WebhookVariant::Generic => "generic",
        }
    }
}

impl FromStr for WebhookVariant {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "slack" => Ok(WebhookVariant::Slack),
            "discord" => Ok(WebhookVariant::Discord),
            "teams" => Ok(WebhookVariant::Teams),
            "generic" | "json" => Ok(WebhookVariant::Generic),
            other => Err(AppError::Config(format!(
                "WEBHOOK_TYPE must be one of slack, discord, teams, generic (got '{other}')"
            ))),
        }
    }
}

/// How the SMTP connection is secured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmtpTls {
    /// Plain connection upgraded with STARTTLS (port 587).
    StartTls,
    /// Implicit TLS (port 465).
    Tls,
    /// No encryption. Only for local relays.
    None,
}

impl FromStr for SmtpTls {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "starttls" => Ok(SmtpTls::StartTls),
            "tls" | "ssl" => Ok(SmtpTls::Tls),
            "none" | "plain" => Ok(SmtpTls::None),
            other => Err(AppError::Config(format!(
                "SMTP_TLS must be one of starttls, tls, none (got '{other}')"
            ))),
        }
    }
}

/// Chat webhook (Slack, Discord, Teams) settings.
#[derive(Debug, Clone)]
pub struct WebhookConfig {
    pub url: String,
    pub variant: WebhookVariant,
}

/// SMTP email settings.
#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_user: Option<String>,
    pub smtp_password: Option<String>,
    pub tls: SmtpTls,
    pub from_address: String,
    /// One message is sent with all recipients on the `To` line.
    pub to_addresses: Vec<String>,
}

/// Telegram Bot API settings.
#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub chat_id: String,
    /// Base URL of the Bot API (overridable for self-hosted Bot API servers).
    pub api_base: String,
}

/// Generic HTTP callback settings.
#[derive(Debug, Clone)]
pub struct CustomWebhookConfig {
    pub url: String,
    /// Extra request headers, e.g. an `Authorization` token.
    pub headers: BTreeMap<String, String>,
}

/// Per-channel configuration. `None` means the channel is disabled.
#[derive(Debug, Clone, Default)]
pub struct ChannelsConfig {
    pub webhook: Option<WebhookConfig>,
    pub email: Option<EmailConfig>,
    pub telegram: Option<TelegramConfig>,
    pub custom_webhook: Option<CustomWebhookConfig>,
    /// Timeout applied to every HTTP or SMTP delivery attempt.
    pub timeout: Duration,
}

/// Where the change-feed listener reads new records from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedMode {
    /// Postgres `LISTEN/NOTIFY` subscription.
    Listen,
    /// Re-query the unprocessed view on an interval.
    Poll,
}

impl FromStr for FeedMode {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "listen" | "live" => Ok(FeedMode::Listen),
            "poll" | "polling" => Ok(FeedMode::Poll),
            other => Err(AppError::Config(format!(
                "CHANGE_FEED_MODE must be listen or poll (got '{other}')"
            ))),
        }
    }
}

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// PostgreSQL connection string
    pub database_url: String,

    /// Maximum number of PostgreSQL connections in the pool (default: 5)
    pub db_max_connections: u32,

    /// Port for the HTTP surface and push endpoint (default: 5005)
    pub web_port: u16,

    /// Change feed implementation (default: listen)
    pub feed_mode: FeedMode,

    /// Polling interval when `feed_mode` is `Poll` (default: 2000)
    pub feed_poll_interval_ms: u64,

    /// Delivery channel settings
    pub channels: ChannelsConfig,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Ok(Self::from_lookup(|key| std::env::var(key).ok())?)
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);

        let config = Self {
            database_url: env.required("DATABASE_URL")?,
            db_max_connections: env.parse_or("DB_MAX_CONNECTIONS", 5)?,
            web_port: env.parse_or("WEB_PORT", 5005)?,
            feed_mode: env.parse_or("CHANGE_FEED_MODE", FeedMode::Listen)?,
            feed_poll_interval_ms: env.parse_or("FEED_POLL_INTERVAL_MS", 2000)?,
            channels: ChannelsConfig::from_env(&env)?,
        };

        // The live feed keeps one pooled connection for LISTEN.
        let (min_connections, mode) = match config.feed_mode {
            FeedMode::Listen => (2, "listen"),
            FeedMode::Poll => (1, "poll"),
        };
        if config.db_max_connections < min_connections {
            return Err(AppError::Config(format!(
                "DB_MAX_CONNECTIONS must be at least {min_connections} when CHANGE_FEED_MODE={mode}"
            )));
        }

        Ok(config)
    }
}

impl ChannelsConfig {
    fn from_env<F: Fn(&str) -> Option<String>>(env: &Env<F>) -> Result<Self, AppError> {
        let webhook = if env.flag("ENABLE_WEBHOOK") {
            Some(WebhookConfig {
                url: env.required_for("WEBHOOK_URL", "ENABLE_WEBHOOK")?,
                variant: env.parse_or("WEBHOOK_TYPE", WebhookVariant::Slack)?,
            })
        } else {
            None
        };

        let email = if env.flag("ENABLE_EMAIL") {
            let to_addresses: Vec<String> = env
                .required_for("EMAIL_TO", "ENABLE_EMAIL")?
                .split(',')
                .map(str::trim)
                .filter(|addr| !addr.is_empty())
                .map(str::to_string)
                .collect();
            if to_addresses.is_empty() {
                return Err(AppError::Config(
                    "EMAIL_TO must list at least one recipient".to_string(),
                ));
            }
            Some(EmailConfig {
                smtp_host: env.required_for("SMTP_HOST", "ENABLE_EMAIL")?,
                smtp_port: env.parse_or("SMTP_PORT", 587)?,
                smtp_user: env.get("SMTP_USER"),
                smtp_password: env.get("SMTP_PASS"),
                tls: env.parse_or("SMTP_TLS", SmtpTls::StartTls)?,
                from_address: env.required_for("EMAIL_FROM", "ENABLE_EMAIL")?,
                to_addresses,
            })
        } else {
            None
        };

        let telegram = if env.flag("ENABLE_TELEGRAM") {
            Some(TelegramConfig {
                bot_token: env.required_for("TELEGRAM_BOT_TOKEN", "ENABLE_TELEGRAM")?,
                chat_id: env.required_for("TELEGRAM_CHAT_ID", "ENABLE_TELEGRAM")?,
                api_base: env
                    .get("TELEGRAM_API_BASE")
                    .unwrap_or_else(|| "https://api.telegram.org".to_string())
                    .trim_end_matches('/')
                    .to_string(),
            })
        } else {
            None
        };

        let custom_webhook = if env.flag("ENABLE_CUSTOM_WEBHOOK") {
            Some(CustomWebhookConfig {
                url: env.required_for("CUSTOM_WEBHOOK_URL", "ENABLE_CUSTOM_WEBHOOK")?,
                headers: match env.get("CUSTOM_WEBHOOK_HEADERS") {
                    Some(raw) => parse_headers(&raw)?,
                    None => BTreeMap::new(),
                },
            })
        } else {
            None
        };

        Ok(Self {
            webhook,
            email,
            telegram,
            custom_webhook,
            timeout: Duration::from_secs(env.parse_or("CHANNEL_TIMEOUT_SECS", 10)?),
        })
    }
}

/// Parse `CUSTOM_WEBHOOK_HEADERS`, a JSON object of string values.
pub fn parse_headers(raw: &str) -> Result<BTreeMap<String, String>, AppError> {
    if raw.trim().is_empty() {
        return Ok(BTreeMap::new());
    }
    serde_json::from_str(raw).map_err(|e| {
        AppError::Config(format!(
            "CUSTOM_WEBHOOK_HEADERS must be a JSON object of strings: {e}"
        ))
    })
}

/// Companion forwarder configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct CompanionConfig {
    /// Base URL of the notifier service (default: http://localhost:5005)
    pub notifier_url: String,

    /// Alert sound name (default: Ping)
    pub notification_sound: String,

    /// How long an alert stays on screen, in seconds (default: 10)
    pub notification_timeout_secs: u64,

    /// First reconnect delay in milliseconds (default: 1000)
    pub reconnect_initial_ms: u64,

    /// Reconnect delay cap in milliseconds (default: 5000)
    pub reconnect_max_ms: u64,

    /// Growth factor between reconnect attempts (default: 2.0)
    pub reconnect_multiplier: f64,

    /// `desktop` for native alerts, `log` to only log them (default: desktop)
    pub alert_renderer: String,
}

impl CompanionConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Ok(Self::from_lookup(|key| std::env::var(key).ok())?)
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);

        let config = Self {
            notifier_url: env
                .get("NOTIFIER_URL")
                .unwrap_or_else(|| "http://localhost:5005".to_string()),
            notification_sound: env
                .get("NOTIFICATION_SOUND")
                .unwrap_or_else(|| "Ping".to_string()),
            notification_timeout_secs: env.parse_or("NOTIFICATION_TIMEOUT", 10)?,
            reconnect_initial_ms: env.parse_or("RECONNECT_INITIAL_MS", 1000)?,
            reconnect_max_ms: env.parse_or("RECONNECT_MAX_MS", 5000)?,
            reconnect_multiplier: env.parse_or("RECONNECT_MULTIPLIER", 2.0)?,
            alert_renderer: env
                .get("ALERT_RENDERER")
                .unwrap_or_else(|| "desktop".to_string()),
        };

        if config.reconnect_initial_ms == 0 {
            return Err(AppError::Config(
                "RECONNECT_INITIAL_MS must be greater than 0".to_string(),
            ));
        }

        if config.reconnect_initial_ms > config.reconnect_max_ms {
            return Err(AppError::Config(
                "RECONNECT_INITIAL_MS must not exceed RECONNECT_MAX_MS".to_string(),
            ));
        }

        if config.reconnect_multiplier < 1.0 {
            return Err(AppError::Config(
                "RECONNECT_MULTIPLIER must be at least 1.0".to_string(),
            ));
        }

        Ok(config)
    }
}

/// Typed accessors over a key lookup.
struct Env<F>(F);

impl<F: Fn(&str) -> Option<String>> Env<F> {
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|value| !value.trim().is_empty())
    }

    /// Channel flags are on only for the literal value `true`.
    fn flag(&self, key: &str) -> bool {
        self.get(key).is_some_and(|value| value.trim() == "true")
    }

    fn required(&self, key: &str) -> Result<String, AppError> {
        self.get(key)
            .ok_or_else(|| AppError::Config(format!("{key} environment variable is required")))
    }

    fn required_for(&self, key: &str, flag: &str) -> Result<String, AppError> {
        self.get(key)
            .ok_or_else(|| AppError::Config(format!("{key} is required when {flag}=true")))
    }

    fn parse_or<T>(&self, key: &str, default: T) -> Result<T, AppError>
    where
        T: FromStr,
    {
        match self.get(key) {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| AppError::Config(format!("{key} has an invalid value '{raw}'"))),
            None => Ok(default),
        }
    }
}
