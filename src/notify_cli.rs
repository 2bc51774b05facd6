//! One-shot notification sender for shell hooks.
//!
//! Exits 0 when the webhook accepted the message, 1 otherwise (including
//! when no webhook is configured).

use clap::Parser;
use orpheus_queue_server::cli_style::{get_styles, print_error, print_success, print_warning};
use orpheus_queue_server::notifications::{DiscordWebhookSink, Notification, Severity};
use std::process::ExitCode;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(
    name = "send-notification",
    about = "Send a Discord webhook notification",
    styles = get_styles()
)]
struct CliArgs {
    /// Notification message body.
    #[clap(long)]
    message: String,

    /// Optional embed title.
    #[clap(long)]
    title: Option<String>,

    /// Event identifier included in the footer.
    #[clap(long, default_value = "manual")]
    event: String,

    /// Severity level used to colour the embed. Unknown values fall back to info.
    #[clap(long, default_value = "info")]
    level: String,

    /// Extra field to attach to the embed (repeatable).
    #[clap(long = "detail", value_name = "KEY=VALUE")]
    details: Vec<String>,

    /// Override the webhook username.
    #[clap(long)]
    username: Option<String>,

    /// Webhook URL.
    #[clap(long, env = "DISCORD_WEBHOOK_URL")]
    webhook_url: Option<String>,
}

fn parse_detail(raw: &str) -> Option<(String, String)> {
    let (key, value) = raw.split_once('=').unwrap_or((raw, ""));
    let key = key.trim();
    if key.is_empty() {
        return None;
    }
    Some((key.to_string(), value.trim().to_string()))
}

fn build_notification(args: &CliArgs) -> Notification {
    let mut notification = Notification::new(
        Severity::parse_lenient(&args.level),
        args.event.clone(),
        args.message.clone(),
    );
    if let Some(title) = args.title.as_deref().filter(|t| !t.trim().is_empty()) {
        notification = notification.with_title(title);
    }
    for (key, value) in args.details.iter().filter_map(|d| parse_detail(d)) {
        notification = notification.with_detail(key, value);
    }
    notification
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = CliArgs::parse();

    let _ = tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::WARN.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init();

    let webhook_url = args
        .webhook_url
        .clone()
        .or_else(|| std::env::var("DISCORD_WEBHOOK").ok())
        .filter(|url| !url.trim().is_empty());
    let Some(webhook_url) = webhook_url else {
        print_warning("Discord webhook not configured; notification skipped.");
        return ExitCode::FAILURE;
    };

    let sink = match DiscordWebhookSink::new(webhook_url, args.username.clone()) {
        Ok(sink) => sink,
        Err(e) => {
            print_error(&format!("{:#}", e));
            return ExitCode::FAILURE;
        }
    };

    let notification = build_notification(&args);
    if sink.deliver(&notification).await {
        print_success(&format!("Sent {} notification.", notification.event));
        ExitCode::SUCCESS
    } else {
        print_error("Failed to send notification.");
        ExitCode::FAILURE
    }
}
