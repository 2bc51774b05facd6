//! Discord webhook notification sink.

use super::{Notification, NotificationSink};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};

const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);
const EMPTY_FIELD_VALUE: &str = "—";

/// Posts notifications as embeds to a Discord webhook.
pub struct DiscordWebhookSink {
    client: reqwest::Client,
    webhook_url: String,
    username: Option<String>,
}

impl DiscordWebhookSink {
    pub fn new(webhook_url: impl Into<String>, username: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(WEBHOOK_TIMEOUT)
            .build()
            .context("Failed to create webhook HTTP client")?;

        Ok(Self {
            client,
            webhook_url: webhook_url.into(),
            username: username.filter(|u| !u.trim().is_empty()),
        })
    }

    /// Builds the webhook JSON body.
    pub fn payload(&self, notification: &Notification) -> Value {
        let mut embed = json!({
            "description": notification.message,
            "color": notification.severity.color(),
            "footer": { "text": format!("Event: {}", notification.event) },
        });

        if let Some(title) = notification.title.as_deref().filter(|t| !t.is_empty()) {
            embed["title"] = json!(title);
        }

        let fields: Vec<Value> = notification
            .details
            .iter()
            .filter(|(key, _)| !key.trim().is_empty())
            .map(|(key, value)| {
                let value = if value.trim().is_empty() {
                    EMPTY_FIELD_VALUE
                } else {
                    value.as_str()
                };
                json!({ "name": key, "value": value, "inline": false })
            })
            .collect();
        if !fields.is_empty() {
            embed["fields"] = Value::Array(fields);
        }

        let mut payload = json!({ "embeds": [embed] });
        if let Some(username) = &self.username {
            payload["username"] = json!(username);
        }
        payload
    }

    /// Sends one notification. Returns whether the webhook accepted it.
    pub async fn deliver(&self, notification: &Notification) -> bool {
        let response = self
            .client
            .post(&self.webhook_url)
            .json(&self.payload(notification))
            .send()
            .await;

        match response {
            Ok(response) if response.status().is_success() => {
                debug!("Delivered notification '{}'", notification.event);
                true
            }
            Ok(response) => {
                warn!(
                    "Discord webhook rejected notification '{}' with status {}",
                    notification.event,
                    response.status()
                );
                false
            }
            Err(e) => {
                warn!(
                    "Failed to deliver notification '{}': {}",
                    notification.event, e
                );
                false
            }
        }
    }
}

#[async_trait]
impl NotificationSink for DiscordWebhookSink {
    async fn notify(&self, notification: Notification) {
        self.deliver(&notification).await;
    }
}
