//! SMTP email channel.

use std::time::Duration;

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use wager_common::config::{EmailConfig, SmtpTls};
use wager_common::summary::{BetSummary, SummaryKind};
use wager_common::types::{ChannelKind, NotificationRecord};

use super::{ChannelError, ChannelSender};

/// Sends one HTML message per record to every configured recipient.
pub struct EmailSender {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Vec<Mailbox>,
}

impl EmailSender {
    /// Build the SMTP transport and validate addresses.
    pub fn new(config: &EmailConfig, timeout: Duration) -> Result<Self, ChannelError> {
        let builder = match config.tls {
            SmtpTls::StartTls => {
                AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
            }
            SmtpTls::Tls => AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)?,
            SmtpTls::None => {
                AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.smtp_host)
            }
        };

        let mut builder = builder.port(config.smtp_port).timeout(Some(timeout));
        if let (Some(user), Some(pass)) = (&config.smtp_user, &config.smtp_password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        let from: Mailbox = config.from_address.parse()?;
        let to = config
            .to_addresses
            .iter()
            .map(|addr| addr.parse::<Mailbox>())
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            transport: builder.build(),
            from,
            to,
        })
    }
}

/// Subject line, e.g. `🎲 New Bet: Alice - $10.00`.
pub(crate) fn render_subject(summary: &BetSummary) -> String {
    match summary.kind {
        SummaryKind::Created => format!(
            "{} New Bet: {} - {}",
            summary.emoji(),
            summary.creator,
            summary.amount
        ),
        SummaryKind::Taken => format!("{} Bet Accepted: {}", summary.emoji(), summary.matchup()),
    }
}

pub(crate) fn render_html(summary: &BetSummary) -> String {
    let mut html = format!(
        "<h2>{} {}</h2>\n<p><strong>Creator:</strong> {}</p>\n",
        summary.emoji(),
        summary.headline(),
        escape_html(&summary.creator)
    );
    if let Some(taker) = &summary.taker {
        html.push_str(&format!(
            "<p><strong>Taker:</strong> {}</p>\n",
            escape_html(taker)
        ));
    }
    html.push_str(&format!(
        "<p><strong>Amount:</strong> {}</p>\n<p><strong>Description:</strong> {}</p>\n<p style=\"color: #666;\">{}</p>\n",
        summary.amount,
        escape_html(&summary.description),
        summary.status_line()
    ));
    html
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[async_trait]
impl ChannelSender for EmailSender {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Email
    }

    async fn deliver(
        &self,
        _record: &NotificationRecord,
        summary: &BetSummary,
    ) -> Result<(), ChannelError> {
        let mut builder = Message::builder()
            .from(self.from.clone())
            .subject(render_subject(summary))
            .header(ContentType::TEXT_HTML);
        for recipient in &self.to {
            builder = builder.to(recipient.clone());
        }

        let message = builder
            .body(render_html(summary))
            .map_err(|e| ChannelError::Build(e.to_string()))?;

        self.transport.send(message).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use wager_common::types::{Amount, NotificationType};

    use super::*;

    fn summary(kind: NotificationType, taker: Option<&str>, description: &str) -> BetSummary {
        let record = NotificationRecord {
            id: "n1".to_string(),
            kind,
            bet_id: "b1".to_string(),
            bet_description: description.to_string(),
            bet_amount: Amount::from_cents(1000),
            creator_name: "Alice".to_string(),
            creator_photo: None,
            taker_name: taker.map(str::to_string),
            taker_photo: None,
            created_at: Utc::now(),
            processed: false,
        };
        BetSummary::from_record(&record).unwrap()
    }

    fn config(from: &str) -> EmailConfig {
        EmailConfig {
            smtp_host: "localhost".to_string(),
            smtp_port: 2525,
            smtp_user: None,
            smtp_password: None,
            tls: SmtpTls::None,
            from_address: from.to_string(),
            to_addresses: vec!["a@example.com".to_string(), "b@example.com".to_string()],
        }
    }

    #[test]
    fn test_subjects() {
        let created = summary(NotificationType::BetCreated, None, "Lakers win");
        assert_eq!(render_subject(&created), "🎲 New Bet: Alice - $10.00");

        let taken = summary(NotificationType::BetTaken, Some("Bob"), "Lakers win");
        assert_eq!(render_subject(&taken), "🤝 Bet Accepted: Alice vs Bob");
    }

    #[test]
    fn test_html_created_has_no_taker() {
        let html = render_html(&summary(NotificationType::BetCreated, None, "Lakers win"));
        assert!(html.contains("<h2>🎲 New Bet Created!</h2>"));
        assert!(html.contains("<strong>Amount:</strong> $10.00"));
        assert!(!html.contains("Taker:"));
        assert!(html.contains("Waiting for someone to take this bet..."));
    }

    #[test]
    fn test_html_taken_escapes_description() {
        let html = render_html(&summary(
            NotificationType::BetTaken,
            None,
            "<b>Lakers</b> & Celtics",
        ));
        assert!(html.contains("<strong>Taker:</strong> Unknown"));
        assert!(html.contains("&lt;b&gt;Lakers&lt;/b&gt; &amp; Celtics"));
        assert!(html.contains("The bet is on!"));
    }

    #[tokio::test]
    async fn test_new_validates_addresses() {
        assert!(EmailSender::new(&config("bets@example.com"), Duration::from_secs(5)).is_ok());
        let err = EmailSender::new(&config("not an address"), Duration::from_secs(5))
            .err()
            .unwrap();
        assert!(matches!(err, ChannelError::Address(_)));
    }
}
