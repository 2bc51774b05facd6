use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Core settings (can override CLI)
    pub db_dir: Option<String>,
    pub music_dir: Option<String>,
    pub photo_dir: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub logging_level: Option<String>,
    pub frontend_dir_path: Option<String>,

    // Feature configs
    pub scheduler: Option<SchedulerConfig>,
    pub downloader: Option<DownloaderConfig>,
    pub qobuz: Option<QobuzConfig>,
    pub notifications: Option<NotificationsConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Intervals are kept raw so that a bad value falls back to the default
    /// instead of failing the whole file.
    pub idle_interval_secs: Option<toml::Value>,
    pub entry_interval_secs: Option<toml::Value>,
    pub retry_interval_secs: Option<toml::Value>,
    /// Unset means retry challenged entries forever.
    pub max_challenge_retries: Option<u32>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct DownloaderConfig {
    pub program: Option<String>,
    pub args: Option<Vec<String>>,
    pub working_dir: Option<String>,
    pub provider: Option<String>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct QobuzConfig {
    pub base_url: Option<String>,
    pub app_id: Option<String>,
    pub user_auth_token: Option<String>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct NotificationsConfig {
    pub discord_webhook_url: Option<String>,
    pub username: Option<String>,
}

/// Text form of a raw interval value, as it would appear on the command line.
pub fn interval_text(value: Option<&toml::Value>) -> Option<String> {
    match value? {
        toml::Value::String(s) => Some(s.clone()),
        toml::Value::Integer(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}
