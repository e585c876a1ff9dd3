//! Channel-independent view of a notification.
//!
//! Every sender (chat webhooks, email, bot API, desktop alerts) renders from a
//! [`BetSummary`] so the selected data is identical across channels and only
//! the presentation differs.

use crate::types::{NotificationRecord, NotificationType};

/// Shown for `bet_taken` records whose taker name is missing.
pub const UNKNOWN_TAKER: &str = "Unknown";

/// Which lifecycle event the summary describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryKind {
    /// Bet is open and waiting for a taker.
    Created,
    /// Bet has a taker and is active.
    Taken,
}

/// Data selected from a record for rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BetSummary {
    pub kind: SummaryKind,
    pub creator: String,
    /// Always `None` for [`SummaryKind::Created`].
    pub taker: Option<String>,
    /// Pre-formatted amount, e.g. `$10.00`.
    pub amount: String,
    pub description: String,
}

impl BetSummary {
    /// Build a summary, or `None` when the record type has no template.
    pub fn from_record(record: &NotificationRecord) -> Option<Self> {
        let (kind, taker) = match &record.kind {
            NotificationType::BetCreated => (SummaryKind::Created, None),
            NotificationType::BetTaken => (
                SummaryKind::Taken,
                Some(
                    record
                        .taker_name
                        .clone()
                        .filter(|name| !name.trim().is_empty())
                        .unwrap_or_else(|| UNKNOWN_TAKER.to_string()),
                ),
            ),
            NotificationType::Unknown(_) => return None,
        };

        Some(Self {
            kind,
            creator: record.creator_name.clone(),
            taker,
            amount: record.bet_amount.to_string(),
            description: record.bet_description.clone(),
        })
    }

    pub fn emoji(&self) -> &'static str {
        match self.kind {
            SummaryKind::Created => "🎲",
            SummaryKind::Taken => "🤝",
        }
    }

    /// Headline without emoji, e.g. `New Bet Created!`.
    pub fn headline(&self) -> &'static str {
        match self.kind {
            SummaryKind::Created => "New Bet Created!",
            SummaryKind::Taken => "Bet Accepted!",
        }
    }

    /// `Alice` for new bets, `Alice vs Bob` once taken.
    pub fn matchup(&self) -> String {
        match &self.taker {
            Some(taker) => format!("{} vs {}", self.creator, taker),
            None => self.creator.clone(),
        }
    }

    /// Closing line describing the bet's state.
    pub fn status_line(&self) -> &'static str {
        match self.kind {
            SummaryKind::Created => "Waiting for someone to take this bet...",
            SummaryKind::Taken => "The bet is on! 🔥",
        }
    }
}
