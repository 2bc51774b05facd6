mod file_config;

pub use file_config::{
    interval_text, DownloaderConfig, FileConfig, NotificationsConfig, QobuzConfig,
    SchedulerConfig,
};

use crate::qobuz::QOBUZ_API_BASE;
use crate::scheduler::{RetryPolicy, DEFAULT_RETRY_DELAY_SECS};
use crate::server::RequestsLoggingLevel;
use anyhow::{bail, Result};
use clap::ValueEnum;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

pub const DB_FILE_NAME: &str = "orpheusdl-container.db";
pub const DEFAULT_DB_DIR: &str = "/data/lists";
pub const DEFAULT_IDLE_INTERVAL_SECS: u64 = 60;
pub const DEFAULT_ENTRY_INTERVAL_SECS: u64 = 5;
pub const DEFAULT_DOWNLOADER_PROGRAM: &str = "python3";
pub const DEFAULT_DOWNLOADER_DIR: &str = "/orpheusdl";
pub const DEFAULT_PROVIDER: &str = "qobuz";

fn default_downloader_args() -> Vec<String> {
    vec!["-u".to_string(), "orpheus.py".to_string()]
}

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone)]
pub struct CliConfig {
    pub db_dir: Option<PathBuf>,
    pub music_dir: Option<PathBuf>,
    pub photo_dir: Option<PathBuf>,
    pub host: String,
    pub port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub frontend_dir_path: Option<String>,
    // Scheduler intervals arrive as raw strings, typically from the environment.
    pub check_interval: Option<String>,
    pub entry_interval: Option<String>,
    pub captcha_retry_interval: Option<String>,
    pub downloader_program: Option<String>,
    pub downloader_dir: Option<PathBuf>,
    pub provider: Option<String>,
    pub qobuz_app_id: Option<String>,
    pub qobuz_user_auth_token: Option<String>,
    pub discord_webhook_url: Option<String>,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            db_dir: None,
            music_dir: None,
            photo_dir: None,
            host: "0.0.0.0".to_string(),
            port: 8080,
            logging_level: RequestsLoggingLevel::default(),
            frontend_dir_path: None,
            check_interval: None,
            entry_interval: None,
            captcha_retry_interval: None,
            downloader_program: None,
            downloader_dir: None,
            provider: None,
            qobuz_app_id: None,
            qobuz_user_auth_token: None,
            discord_webhook_url: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    // Core settings
    pub db_dir: PathBuf,
    pub music_dir: Option<PathBuf>,
    pub photo_dir: PathBuf,
    pub host: String,
    pub port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub frontend_dir_path: Option<String>,

    // Feature configs (with defaults)
    pub scheduler: SchedulerSettings,
    pub downloader: DownloaderSettings,
    pub qobuz: QobuzSettings,
    pub notifications: NotificationSettings,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let db_dir = file
            .db_dir
            .map(PathBuf::from)
            .or_else(|| cli.db_dir.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_DIR));
        if db_dir.exists() && !db_dir.is_dir() {
            bail!("db_dir is not a directory: {:?}", db_dir);
        }

        let music_dir = file
            .music_dir
            .map(PathBuf::from)
            .or_else(|| cli.music_dir.clone())
            .filter(|p| !p.as_os_str().is_empty());
        let photo_dir = file
            .photo_dir
            .map(PathBuf::from)
            .or_else(|| cli.photo_dir.clone())
            .unwrap_or_else(|| db_dir.join("photos"));

        let host = file.host.unwrap_or_else(|| cli.host.clone());
        let port = file.port.unwrap_or(cli.port);
        let logging_level = file
            .logging_level
            .and_then(|s| parse_logging_level(&s))
            .unwrap_or_else(|| cli.logging_level.clone());
        let frontend_dir_path = file
            .frontend_dir_path
            .or_else(|| cli.frontend_dir_path.clone());

        let sched_file = file.scheduler.unwrap_or_default();
        let scheduler = SchedulerSettings {
            idle_interval_secs: interval_setting(
                interval_text(sched_file.idle_interval_secs.as_ref()).as_deref(),
                cli.check_interval.as_deref(),
                DEFAULT_IDLE_INTERVAL_SECS,
            ),
            entry_interval_secs: interval_setting(
                interval_text(sched_file.entry_interval_secs.as_ref()).as_deref(),
                cli.entry_interval.as_deref(),
                DEFAULT_ENTRY_INTERVAL_SECS,
            ),
            retry_interval_secs: interval_setting(
                interval_text(sched_file.retry_interval_secs.as_ref()).as_deref(),
                cli.captcha_retry_interval.as_deref(),
                DEFAULT_RETRY_DELAY_SECS,
            ),
            max_challenge_retries: sched_file.max_challenge_retries.filter(|n| *n > 0),
        };

        let dl_file = file.downloader.unwrap_or_default();
        let downloader = DownloaderSettings {
            program: non_blank(dl_file.program)
                .or_else(|| non_blank(cli.downloader_program.clone()))
                .unwrap_or_else(|| DEFAULT_DOWNLOADER_PROGRAM.to_string()),
            args: dl_file.args.unwrap_or_else(default_downloader_args),
            working_dir: dl_file
                .working_dir
                .map(PathBuf::from)
                .or_else(|| cli.downloader_dir.clone())
                .or_else(|| Some(PathBuf::from(DEFAULT_DOWNLOADER_DIR)))
                .filter(|p| !p.as_os_str().is_empty()),
            provider: non_blank(dl_file.provider)
                .or_else(|| non_blank(cli.provider.clone()))
                .unwrap_or_else(|| DEFAULT_PROVIDER.to_string()),
        };

        let qobuz_file = file.qobuz.unwrap_or_default();
        let qobuz = QobuzSettings {
            base_url: non_blank(qobuz_file.base_url)
                .unwrap_or_else(|| QOBUZ_API_BASE.to_string()),
            app_id: non_blank(qobuz_file.app_id).or_else(|| non_blank(cli.qobuz_app_id.clone())),
            user_auth_token: non_blank(qobuz_file.user_auth_token)
                .or_else(|| non_blank(cli.qobuz_user_auth_token.clone())),
        };

        let notif_file = file.notifications.unwrap_or_default();
        let notifications = NotificationSettings {
            discord_webhook_url: non_blank(notif_file.discord_webhook_url)
                .or_else(|| non_blank(cli.discord_webhook_url.clone())),
            username: non_blank(notif_file.username),
        };

        Ok(Self {
            db_dir,
            music_dir,
            photo_dir,
            host,
            port,
            logging_level,
            frontend_dir_path,
            scheduler,
            downloader,
            qobuz,
            notifications,
        })
    }

    pub fn db_path(&self) -> PathBuf {
        self.db_dir.join(DB_FILE_NAME)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerSettings {
    pub idle_interval_secs: u64,
    pub entry_interval_secs: u64,
    pub retry_interval_secs: u64,
    pub max_challenge_retries: Option<u32>,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            idle_interval_secs: DEFAULT_IDLE_INTERVAL_SECS,
            entry_interval_secs: DEFAULT_ENTRY_INTERVAL_SECS,
            retry_interval_secs: DEFAULT_RETRY_DELAY_SECS,
            max_challenge_retries: None,
        }
    }
}

impl SchedulerSettings {
    pub fn idle_interval(&self) -> Duration {
        Duration::from_secs(self.idle_interval_secs)
    }

    pub fn entry_interval(&self) -> Duration {
        Duration::from_secs(self.entry_interval_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            Duration::from_secs(self.retry_interval_secs),
            self.max_challenge_retries,
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloaderSettings {
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
    pub provider: String,
}

impl Default for DownloaderSettings {
    fn default() -> Self {
        Self {
            program: DEFAULT_DOWNLOADER_PROGRAM.to_string(),
            args: default_downloader_args(),
            working_dir: Some(PathBuf::from(DEFAULT_DOWNLOADER_DIR)),
            provider: DEFAULT_PROVIDER.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QobuzSettings {
    pub base_url: String,
    pub app_id: Option<String>,
    pub user_auth_token: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotificationSettings {
    pub discord_webhook_url: Option<String>,
    pub username: Option<String>,
}

/// Parses a positive number of seconds, falling back to `default` for
/// missing, non-numeric or zero values.
pub fn parse_interval_or_default(raw: Option<&str>, default: u64) -> u64 {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return default;
    };
    parse_interval(raw).unwrap_or_else(|| {
        warn!(
            "Invalid interval {:?}, falling back to {} seconds",
            raw, default
        );
        default
    })
}

fn parse_interval(raw: &str) -> Option<u64> {
    raw.parse::<u64>().ok().filter(|secs| *secs > 0)
}

/// A valid TOML value wins; an invalid one is logged and the CLI value (or
/// the default) is used instead.
fn interval_setting(file_value: Option<&str>, cli_value: Option<&str>, default: u64) -> u64 {
    if let Some(raw) = file_value.map(str::trim).filter(|s| !s.is_empty()) {
        match parse_interval(raw) {
            Some(secs) => return secs,
            None => warn!("Ignoring invalid interval {:?} in config file", raw),
        }
    }
    parse_interval_or_default(cli_value, default)
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Parses a logging level string into RequestsLoggingLevel.
/// Uses clap's ValueEnum trait for parsing.
fn parse_logging_level(s: &str) -> Option<RequestsLoggingLevel> {
    RequestsLoggingLevel::from_str(s, true).ok()
}
