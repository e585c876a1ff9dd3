use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Bet lifecycle event carried by a notification record.
///
/// Producers only write `bet_created` and `bet_taken`; anything else is kept
/// verbatim as [`NotificationType::Unknown`] so senders can log and skip it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationType {
    BetCreated,
    BetTaken,
    Unknown(String),
}

impl NotificationType {
    pub fn as_str(&self) -> &str {
        match self {
            NotificationType::BetCreated => "bet_created",
            NotificationType::BetTaken => "bet_taken",
            NotificationType::Unknown(raw) => raw,
        }
    }
}

impl From<String> for NotificationType {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "bet_created" => NotificationType::BetCreated,
            "bet_taken" => NotificationType::BetTaken,
            _ => NotificationType::Unknown(raw),
        }
    }
}

impl From<&str> for NotificationType {
    fn from(raw: &str) -> Self {
        NotificationType::from(raw.to_string())
    }
}

impl fmt::Display for NotificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for NotificationType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for NotificationType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(NotificationType::from)
    }
}

/// Currency amount held as whole cents.
///
/// Serialized as a decimal number (`10.0` for ten dollars) to match the
/// upstream document shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Amount(i64);

impl Amount {
    pub fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    pub fn cents(&self) -> i64 {
        self.0
    }

    fn from_decimal(value: f64) -> Self {
        Self((value * 100.0).round() as i64)
    }

    fn to_decimal(self) -> f64 {
        self.0 as f64 / 100.0
    }
}

/// Formats as `$N.NN`.
impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{}${}.{:02}", sign, abs / 100, abs % 100)
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.to_decimal())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        f64::deserialize(deserializer).map(Amount::from_decimal)
    }
}

/// A unit of work: one bet lifecycle event to fan out.
///
/// `processed` only ever moves from `false` to `true`, and only the dispatch
/// coordinator writes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRecord {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub bet_id: String,
    pub bet_description: String,
    pub bet_amount: Amount,
    pub creator_name: String,
    pub creator_photo: Option<String>,
    pub taker_name: Option<String>,
    pub taker_photo: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub processed: bool,
}

/// Row shape of the `notifications` table as selected by the record store.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct NotificationRow {
    pub id: String,
    pub kind: String,
    pub bet_id: String,
    pub bet_description: String,
    pub bet_amount_cents: i64,
    pub creator_name: String,
    pub creator_photo: Option<String>,
    pub taker_name: Option<String>,
    pub taker_photo: Option<String>,
    pub created_at: DateTime<Utc>,
    pub processed: bool,
}

impl From<NotificationRow> for NotificationRecord {
    fn from(row: NotificationRow) -> Self {
        Self {
            id: row.id,
            kind: NotificationType::from(row.kind),
            bet_id: row.bet_id,
            bet_description: row.bet_description,
            bet_amount: Amount::from_cents(row.bet_amount_cents),
            creator_name: row.creator_name,
            creator_photo: row.creator_photo,
            taker_name: row.taker_name,
            taker_photo: row.taker_photo,
            created_at: row.created_at,
            processed: row.processed,
        }
    }
}

/// Delivery channels a record can be fanned out to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    Webhook,
    Email,
    Telegram,
    CustomWebhook,
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelKind::Webhook => write!(f, "webhook"),
            ChannelKind::Email => write!(f, "email"),
            ChannelKind::Telegram => write!(f, "telegram"),
            ChannelKind::CustomWebhook => write!(f, "custom_webhook"),
        }
    }
}

/// Result of a single delivery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Sent,
    Failed,
    /// Record type has no template; nothing was sent and the channel is
    /// not considered failed.
    Skipped,
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeliveryStatus::Sent => write!(f, "sent"),
            DeliveryStatus::Failed => write!(f, "failed"),
            DeliveryStatus::Skipped => write!(f, "skipped"),
        }
    }
}

/// Per-channel outcome of one fan-out. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchOutcome {
    pub channel: ChannelKind,
    pub status: DeliveryStatus,
    pub error_detail: Option<String>,
}

impl DispatchOutcome {
    pub fn sent(channel: ChannelKind) -> Self {
        Self {
            channel,
            status: DeliveryStatus::Sent,
            error_detail: None,
        }
    }

    pub fn skipped(channel: ChannelKind) -> Self {
        Self {
            channel,
            status: DeliveryStatus::Skipped,
            error_detail: None,
        }
    }

    pub fn failed(channel: ChannelKind, detail: impl Into<String>) -> Self {
        Self {
            channel,
            status: DeliveryStatus::Failed,
            error_detail: Some(detail.into()),
        }
    }

    pub fn is_failure(&self) -> bool {
        self.status == DeliveryStatus::Failed
    }
}

/// A dispatched record as held in the dashboard's recent-history buffer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardEntry {
    #[serde(flatten)]
    pub record: NotificationRecord,
    pub received_at: DateTime<Utc>,
}

impl DashboardEntry {
    pub fn new(record: NotificationRecord) -> Self {
        Self {
            record,
            received_at: Utc::now(),
        }
    }
}

/// Frame pushed from the dashboard hub to connected viewers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "lowercase")]
pub enum HubMessage {
    /// Full buffer, newest first. Sent once per connection.
    Recent(Vec<DashboardEntry>),
    /// A single live broadcast.
    Notification(NotificationRecord),
}
