//! Best-effort operator notifications.
//!
//! A [`NotificationSink`] never fails from the caller's point of view:
//! delivery problems are logged and dropped.

mod discord;

pub use discord::DiscordWebhookSink;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Severity of a notification, mapped to an embed color by webhook sinks.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Debug,
    #[default]
    Info,
    Success,
    Warning,
    Error,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Debug => "debug",
            Severity::Info => "info",
            Severity::Success => "success",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Critical => "critical",
        }
    }

    pub fn color(&self) -> u32 {
        match self {
            Severity::Debug => 0x95A5A6,
            Severity::Info => 0x3498DB,
            Severity::Success => 0x2ECC71,
            Severity::Warning => 0xF1C40F,
            Severity::Error => 0xE74C3C,
            Severity::Critical => 0xC0392B,
        }
    }

    /// Case-insensitive parse, unknown values map to `Info`.
    pub fn parse_lenient(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "debug" => Severity::Debug,
            "success" => Severity::Success,
            "warning" | "warn" => Severity::Warning,
            "error" => Severity::Error,
            "critical" => Severity::Critical,
            _ => Severity::Info,
        }
    }
}

/// A single event for the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub severity: Severity,
    /// Machine-friendly event name, e.g. `download_failed`.
    pub event: String,
    pub message: String,
    pub title: Option<String>,
    /// Ordered key/value details.
    pub details: Vec<(String, String)>,
}

impl Notification {
    pub fn new(severity: Severity, event: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity,
            event: event.into(),
            message: message.into(),
            title: None,
            details: Vec::new(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.details.push((key.into(), value.into()));
        self
    }
}

/// Fire-and-forget delivery of operator notifications.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, notification: Notification);
}

/// Sink used when no webhook is configured.
pub struct NoOpNotificationSink;

#[async_trait]
impl NotificationSink for NoOpNotificationSink {
    async fn notify(&self, notification: Notification) {
        tracing::debug!(
            "Notification '{}' dropped, no sink configured",
            notification.event
        );
    }
}

/// Delivers on a background task so the caller never waits on the sink.
pub fn notify_in_background(sink: &Arc<dyn NotificationSink>, notification: Notification) {
    let sink = sink.clone();
    tokio::spawn(async move {
        sink.notify(notification).await;
    });
}
