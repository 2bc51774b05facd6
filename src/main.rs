use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, level_filters::LevelFilter, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use orpheus_queue_server::artwork::ArtworkCache;
use orpheus_queue_server::cli_style::get_styles;
use orpheus_queue_server::config::{AppConfig, CliConfig, FileConfig};
use orpheus_queue_server::download_queue::{
    import_legacy_lists, DownloadQueueStore, SqliteDownloadQueueStore,
};
use orpheus_queue_server::notifications::{
    DiscordWebhookSink, NoOpNotificationSink, NotificationSink,
};
use orpheus_queue_server::qobuz::{QobuzCredentials, QobuzSearchClient, SearchProvider};
use orpheus_queue_server::scheduler::{CommandDownloader, QueueScheduler};
use orpheus_queue_server::server::{self, run_server, RequestsLoggingLevel, ServerConfig};
use orpheus_queue_server::ServerState;

fn parse_path(s: &str) -> Result<PathBuf> {
    let path_buf = PathBuf::from(s);
    if path_buf.is_absolute() {
        return Ok(path_buf);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(path_buf))
}

#[derive(Parser, Debug)]
#[command(styles = get_styles())]
struct CliArgs {
    /// Path to a TOML config file. Its values override the command line.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Directory holding the queue database.
    #[clap(long, env = "LISTS_DIR", value_parser = parse_path)]
    pub db_dir: Option<PathBuf>,

    /// Downloaded music, one directory per artist.
    #[clap(long, env = "MUSIC_DIR", default_value = "/data/music", value_parser = parse_path)]
    pub music_dir: PathBuf,

    /// Artist photo cache. Defaults to `<db-dir>/photos`.
    #[clap(long, env = "LISTS_PHOTO_DIR", value_parser = parse_path)]
    pub photo_dir: Option<PathBuf>,

    /// The address to bind.
    #[clap(long, env = "LISTS_WEB_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// The port to listen on.
    #[clap(short, long, env = "LISTS_WEB_PORT", default_value_t = 8080)]
    pub port: u16,

    /// The level of logging to perform on each request.
    #[clap(long, default_value = "path")]
    pub logging_level: RequestsLoggingLevel,

    /// Path to the frontend directory to be statically served.
    #[clap(long)]
    pub frontend_dir_path: Option<String>,

    /// Seconds to wait before re-checking an empty queue.
    #[clap(long, env = "CHECK_INTERVAL")]
    pub check_interval: Option<String>,

    /// Seconds to wait between two entries.
    #[clap(long, env = "ENTRY_INTERVAL")]
    pub entry_interval: Option<String>,

    /// Seconds to wait before retrying an entry that hit a captcha.
    #[clap(long, env = "CAPTCHA_RETRY_INTERVAL")]
    pub captcha_retry_interval: Option<String>,

    /// Program used to run the downloader.
    #[clap(long)]
    pub downloader_program: Option<String>,

    /// Working directory of the downloader.
    #[clap(long, value_parser = parse_path)]
    pub downloader_dir: Option<PathBuf>,

    /// Provider passed to the downloader.
    #[clap(long)]
    pub provider: Option<String>,

    #[clap(long, env = "QOBUZ_APP_ID", hide_env_values = true)]
    pub qobuz_app_id: Option<String>,

    #[clap(long, env = "QOBUZ_USER_AUTH_TOKEN", hide_env_values = true)]
    pub qobuz_user_auth_token: Option<String>,

    /// Discord webhook receiving operator notifications.
    #[clap(long, env = "DISCORD_WEBHOOK_URL", hide_env_values = true)]
    pub discord_webhook_url: Option<String>,
}

impl CliArgs {
    fn to_cli_config(&self) -> CliConfig {
        CliConfig {
            db_dir: self.db_dir.clone(),
            music_dir: Some(self.music_dir.clone()),
            photo_dir: self.photo_dir.clone(),
            host: self.host.clone(),
            port: self.port,
            logging_level: self.logging_level.clone(),
            frontend_dir_path: self.frontend_dir_path.clone(),
            check_interval: self.check_interval.clone(),
            entry_interval: self.entry_interval.clone(),
            captcha_retry_interval: self.captcha_retry_interval.clone(),
            downloader_program: self.downloader_program.clone(),
            downloader_dir: self.downloader_dir.clone(),
            provider: self.provider.clone(),
            qobuz_user_auth_token: self
                .qobuz_user_auth_token
                .clone()
                .or_else(|| std::env::var("QOBUZ_TOKEN").ok()),
            qobuz_app_id: self.qobuz_app_id.clone(),
            discord_webhook_url: self
                .discord_webhook_url
                .clone()
                .or_else(|| std::env::var("DISCORD_WEBHOOK").ok()),
        }
    }
}

fn make_notifier(config: &AppConfig) -> Arc<dyn NotificationSink> {
    let Some(url) = config.notifications.discord_webhook_url.clone() else {
        info!("Discord webhook not configured, notifications disabled");
        return Arc::new(NoOpNotificationSink);
    };
    match DiscordWebhookSink::new(url, config.notifications.username.clone()) {
        Ok(sink) => {
            info!("Discord notifications enabled");
            Arc::new(sink)
        }
        Err(e) => {
            warn!("Failed to set up Discord notifications: {:#}", e);
            Arc::new(NoOpNotificationSink)
        }
    }
}

fn make_search_provider(config: &AppConfig) -> Option<Arc<dyn SearchProvider>> {
    let credentials = QobuzCredentials {
        app_id: config.qobuz.app_id.clone(),
        user_auth_token: config.qobuz.user_auth_token.clone(),
    };
    match QobuzSearchClient::new(&config.qobuz.base_url, credentials) {
        Ok(client) => Some(Arc::new(client)),
        Err(e) => {
            warn!("Failed to set up Qobuz search, search disabled: {:#}", e);
            None
        }
    }
}

/// Cancels `shutdown` on Ctrl+C or SIGTERM.
fn spawn_signal_listener(shutdown: CancellationToken) {
    tokio::spawn(async move {
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for Ctrl+C: {}", e);
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(e) => {
                    error!("Failed to listen for SIGTERM: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        };
        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
            _ = terminate => info!("Received SIGTERM, shutting down..."),
        }
        shutdown.cancel();
    });
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()?;

    let file_config = cli_args
        .config
        .as_deref()
        .map(FileConfig::load)
        .transpose()?;
    let config = AppConfig::resolve(&cli_args.to_cli_config(), file_config)?;

    info!("Initializing metrics...");
    server::metrics::init_metrics();

    let db_path = config.db_path();
    info!("Opening download queue database at {:?}...", db_path);
    let store = Arc::new(
        SqliteDownloadQueueStore::new(&db_path)
            .with_context(|| format!("Failed to open download queue database {:?}", db_path))?,
    );
    import_legacy_lists(store.as_ref(), &config.db_dir)
        .context("Failed to import legacy list files")?;
    let counts = store.counts()?;
    server::metrics::set_queue_counts(&counts);
    info!(
        "Queue holds {} artist(s), {} album(s), {} track(s)",
        counts.artist, counts.album, counts.track
    );

    let notifier = make_notifier(&config);
    let search_provider = make_search_provider(&config);
    let artwork = Arc::new(ArtworkCache::new(config.photo_dir.clone())?);

    let downloader = Arc::new(CommandDownloader {
        program: config.downloader.program.clone(),
        args: config.downloader.args.clone(),
        working_dir: config.downloader.working_dir.clone(),
        provider: config.downloader.provider.clone(),
    });
    info!(
        "Downloader: {} {:?} (provider {}, cwd {:?})",
        downloader.program, downloader.args, downloader.provider, downloader.working_dir
    );

    let scheduler = QueueScheduler::new(
        store.clone(),
        downloader,
        notifier.clone(),
        config.scheduler.retry_policy(),
        config.scheduler.idle_interval(),
        config.scheduler.entry_interval(),
    );
    let scheduler_status = scheduler.status();

    let shutdown = CancellationToken::new();
    spawn_signal_listener(shutdown.clone());

    let scheduler_shutdown = shutdown.clone();
    let scheduler_task = tokio::spawn(async move {
        scheduler.run(scheduler_shutdown).await;
    });

    let state = ServerState {
        config: ServerConfig {
            requests_logging_level: config.logging_level.clone(),
            host: config.host.clone(),
            port: config.port,
            frontend_dir_path: config.frontend_dir_path.clone(),
            music_dir: config.music_dir.clone(),
        },
        start_time: Instant::now(),
        queue_store: store,
        scheduler_status,
        notifier,
        search_provider,
        artwork,
        hash: env!("GIT_HASH").to_string(),
    };

    let server_result = run_server(state, shutdown.clone()).await;
    if let Err(e) = &server_result {
        error!("HTTP server failed: {:#}", e);
    }

    shutdown.cancel();
    if let Err(e) = scheduler_task.await {
        error!("Scheduler task ended abnormally: {}", e);
    }
    info!("Shutdown complete");

    server_result
}
