//! Native desktop alerts.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use wager_common::config::CompanionConfig;
use wager_common::summary::{BetSummary, SummaryKind};
use wager_common::types::NotificationRecord;

/// Text of one desktop alert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesktopAlert {
    pub title: String,
    pub subtitle: String,
    pub message: String,
}

impl DesktopAlert {
    /// `None` for record types with no template.
    pub fn from_record(record: &NotificationRecord) -> Option<Self> {
        let summary = BetSummary::from_record(record)?;
        let title = format!("{} {}", summary.emoji(), summary.headline());

        let alert = match summary.kind {
            SummaryKind::Created => Self {
                title,
                subtitle: format!("{} • {}", summary.creator, summary.amount),
                message: summary.description,
            },
            SummaryKind::Taken => Self {
                title,
                subtitle: summary.matchup(),
                message: format!("{} - {}", summary.amount, summary.description),
            },
        };
        Some(alert)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AlertError {
    #[error("Failed to launch {program}: {source}")]
    Launch {
        program: &'static str,
        source: std::io::Error,
    },

    #[error("{program} exited with {status}: {stderr}")]
    Exit {
        program: &'static str,
        status: std::process::ExitStatus,
        stderr: String,
    },
}

/// Shows alerts to the user.
#[async_trait]
pub trait AlertRenderer: Send + Sync {
    async fn render(&self, alert: &DesktopAlert) -> Result<(), AlertError>;
}

/// Build the renderer selected by `ALERT_RENDERER`.
pub fn renderer_from_config(config: &CompanionConfig) -> Box<dyn AlertRenderer> {
    match config.alert_renderer.trim().to_ascii_lowercase().as_str() {
        "log" => Box::new(LogRenderer),
        "desktop" => Box::new(DesktopRenderer::from(config)),
        other => {
            tracing::warn!(renderer = other, "Unknown alert renderer, using desktop");
            Box::new(DesktopRenderer::from(config))
        }
    }
}

/// Writes alerts to the log only. Useful on headless machines.
pub struct LogRenderer;

#[async_trait]
impl AlertRenderer for LogRenderer {
    async fn render(&self, alert: &DesktopAlert) -> Result<(), AlertError> {
        tracing::info!(
            title = %alert.title,
            subtitle = %alert.subtitle,
            message = %alert.message,
            "Alert"
        );
        Ok(())
    }
}

/// Invokes the platform notifier: `osascript` on macOS, `notify-send` on
/// Linux and a PowerShell balloon tip on Windows.
pub struct DesktopRenderer {
    sound: String,
    timeout: Duration,
}

impl DesktopRenderer {
    pub fn new(sound: impl Into<String>, timeout: Duration) -> Self {
        Self {
            sound: sound.into(),
            timeout,
        }
    }

    /// Program and arguments for the current platform.
    fn command(&self, alert: &DesktopAlert) -> (&'static str, Vec<String>) {
        if cfg!(target_os = "macos") {
            let script = format!(
                "display notification {} with title {} subtitle {} sound name {}",
                applescript_string(&alert.message),
                applescript_string(&alert.title),
                applescript_string(&alert.subtitle),
                applescript_string(&self.sound),
            );
            ("osascript", vec!["-e".to_string(), script])
        } else if cfg!(target_os = "windows") {
            let script = format!(
                "Add-Type -AssemblyName System.Windows.Forms; \
                 $n = New-Object System.Windows.Forms.NotifyIcon; \
                 $n.Icon = [System.Drawing.SystemIcons]::Information; \
                 $n.Visible = $true; \
                 $n.ShowBalloonTip({ms}, {title}, {body}, 'Info'); \
                 Start-Sleep -Milliseconds {ms}; \
                 $n.Dispose()",
                ms = self.timeout.as_millis(),
                title = powershell_string(&alert.title),
                body = powershell_string(&format!("{}\n{}", alert.subtitle, alert.message)),
            );
            (
                "powershell",
                vec!["-NoProfile".to_string(), "-Command".to_string(), script],
            )
        } else {
            (
                "notify-send",
                vec![
                    "--app-name=Wager".to_string(),
                    format!("--expire-time={}", self.timeout.as_millis()),
                    alert.title.clone(),
                    format!("{}\n{}", alert.subtitle, alert.message),
                ],
            )
        }
    }
}

impl From<&CompanionConfig> for DesktopRenderer {
    fn from(config: &CompanionConfig) -> Self {
        Self::new(
            config.notification_sound.clone(),
            Duration::from_secs(config.notification_timeout_secs),
        )
    }
}

#[async_trait]
impl AlertRenderer for DesktopRenderer {
    async fn render(&self, alert: &DesktopAlert) -> Result<(), AlertError> {
        let (program, args) = self.command(alert);

        // The balloon script sleeps for the display time; leave it detached.
        if program == "powershell" {
            Command::new(program)
                .args(&args)
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .spawn()
                .map_err(|source| AlertError::Launch { program, source })?;
            return Ok(());
        }

        let output = Command::new(program)
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|source| AlertError::Launch { program, source })?;

        if !output.status.success() {
            return Err(AlertError::Exit {
                program,
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}

fn applescript_string(raw: &str) -> String {
    format!("\"{}\"", raw.replace('\\', "\\\\").replace('"', "\\\""))
}

fn powershell_string(raw: &str) -> String {
    format!("'{}'", raw.replace('\'', "''"))
}
