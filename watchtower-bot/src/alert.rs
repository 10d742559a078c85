//! Intruder alerts and their delivery to a Discord-compatible webhook.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use mockall::automock;
use reqwest::Client;
use serde::Serialize;
use tracing::{error, info};
use watchtower_proto::{BlockPos, Vec3};

use crate::error::AlertError;
use crate::status::BotStatus;

/// Embed colour used for alerts (red).
pub const ALERT_COLOR: u32 = 0xFF0000;

/// One detection event, built by the scanner and handed to an [`AlertSink`].
#[derive(Debug, Clone, PartialEq)]
pub struct Alert {
    pub player: String,
    /// Distance in blocks, unrounded
    pub distance: f64,
    pub position: BlockPos,
    pub observer: BlockPos,
    pub detected_at: DateTime<Utc>,
}

impl Alert {
    pub fn new(player: &str, distance: f64, position: Vec3, observer: Vec3) -> Self {
        Self {
            player: player.to_string(),
            distance,
            position: position.floored(),
            observer: observer.floored(),
            detected_at: Utc::now(),
        }
    }
}

/// Static text around every alert embed.
#[derive(Debug, Clone)]
pub struct AlertStyle {
    pub title: String,
    pub footer: String,
}

/// Webhook execute body: `{"embeds": [...]}`.
#[derive(Debug, Serialize)]
pub struct WebhookMessage {
    pub embeds: Vec<Embed>,
}

#[derive(Debug, Serialize)]
pub struct Embed {
    pub title: String,
    pub color: u32,
    pub fields: Vec<EmbedField>,
    pub timestamp: DateTime<Utc>,
    pub footer: EmbedFooter,
}

#[derive(Debug, Serialize)]
pub struct EmbedField {
    pub name: &'static str,
    pub value: String,
    pub inline: bool,
}

#[derive(Debug, Serialize)]
pub struct EmbedFooter {
    pub text: String,
}

impl WebhookMessage {
    pub fn for_alert(alert: &Alert, style: &AlertStyle) -> Self {
        let embed = Embed {
            title: style.title.clone(),
            color: ALERT_COLOR,
            fields: vec![
                EmbedField {
                    name: "Player name",
                    value: alert.player.clone(),
                    inline: true,
                },
                EmbedField {
                    name: "Distance",
                    value: format!("{:.1} blocks", alert.distance),
                    inline: true,
                },
                EmbedField {
                    name: "Position",
                    value: format_block_pos(alert.position),
                    inline: false,
                },
                EmbedField {
                    name: "Bot position",
                    value: format_block_pos(alert.observer),
                    inline: false,
                },
            ],
            timestamp: alert.detected_at,
            footer: EmbedFooter {
                text: style.footer.clone(),
            },
        };
        Self {
            embeds: vec![embed],
        }
    }
}

fn format_block_pos(pos: BlockPos) -> String {
    format!("X: {}\nY: {}\nZ: {}", pos.x, pos.y, pos.z)
}

/// Receives alerts from the scanner.
///
/// Implementations must return immediately; delivery happens in the background.
#[automock]
pub trait AlertSink {
    fn dispatch(&self, alert: Alert);
}

/// Posts alerts to a webhook URL.
#[derive(Clone)]
pub struct WebhookDispatcher {
    client: Client,
    url: Arc<str>,
    style: Arc<AlertStyle>,
    status: Arc<BotStatus>,
}

impl WebhookDispatcher {
    /// Create a new [WebhookDispatcher].
    ///
    /// # Arguments
    ///
    /// * `url` - Webhook endpoint receiving the POST.
    /// * `timeout` - Upper bound for one delivery, connection included.
    /// * `style` - Title and footer of the embed.
    /// * `status` - Shared status; its alert counter is bumped on success.
    pub fn new(
        url: &str,
        timeout: Duration,
        style: AlertStyle,
        status: Arc<BotStatus>,
    ) -> Result<Self, AlertError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: Arc::from(url),
            style: Arc::new(style),
            status,
        })
    }

    /// Deliver one alert and wait for the outcome.
    pub async fn send(&self, alert: &Alert) -> Result<(), AlertError> {
        let message = WebhookMessage::for_alert(alert, &self.style);
        let response = self
            .client
            .post(self.url.as_ref())
            .json(&message)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AlertError::Rejected { status, body });
        }

        info!(player = %alert.player, distance = alert.distance, "Alert sent");
        self.status.record_alert();
        Ok(())
    }
}

impl AlertSink for WebhookDispatcher {
    /// Fire and forget: the scan loop never waits on the webhook.
    fn dispatch(&self, alert: Alert) {
        let dispatcher = self.clone();
        tokio::spawn(async move {
            if let Err(e) = dispatcher.send(&alert).await {
                error!(player = %alert.player, "Error sending webhook alert: {}", e);
            }
        });
    }
}
