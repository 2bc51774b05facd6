use anyhow::{Context, Result};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tower_http::services::ServeDir;
use tracing::info;

use axum::{
    extract::State,
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

use super::photo_routes::{get_photo, purge_photos};
use super::queue_routes::{error_response, queue_routes};
use super::search_routes::search_routes;
use super::{log_requests, metrics::metrics_handler, state::*};
use crate::download_queue::QueueCounts;
use crate::scheduler::SchedulerStatus;

#[derive(Serialize)]
struct ServerStats {
    pub uptime: String,
    pub hash: String,
    pub scheduler: SchedulerStatus,
    pub queue: QueueCounts,
}

fn format_uptime(duration: Duration) -> String {
    let total_seconds = duration.as_secs();

    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    format!("{}d {:02}:{:02}:{:02}", days, hours, minutes, seconds)
}

async fn status(State(state): State<ServerState>) -> Response {
    let queue = match state.queue_store.counts() {
        Ok(counts) => counts,
        Err(e) => {
            tracing::warn!("Failed to count queue entries: {}", e);
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error.");
        }
    };
    let stats = ServerStats {
        uptime: format_uptime(state.start_time.elapsed()),
        hash: state.hash.clone(),
        scheduler: state.scheduler_status.read().await.clone(),
        queue,
    };
    Json(stats).into_response()
}

pub fn make_app(state: ServerState) -> Router {
    let api_routes: Router<ServerState> = Router::new()
        .nest("/queue", queue_routes())
        .merge(search_routes())
        .route("/photos/purge", post(purge_photos))
        .route("/status", get(status));

    let home_router: Router<ServerState> = match &state.config.frontend_dir_path {
        Some(frontend_path) => {
            let static_files_service =
                ServeDir::new(frontend_path).append_index_html_on_directories(true);
            Router::new().fallback_service(static_files_service)
        }
        None => Router::new().route("/", get(status)),
    };

    home_router
        .nest("/api", api_routes)
        .route("/photos/{id}", get(get_photo))
        .route("/metrics", get(metrics_handler))
        .layer(middleware::from_fn_with_state(state.clone(), log_requests))
        .with_state(state)
}

/// Serves the API until `shutdown` is cancelled, then drains in-flight requests.
pub async fn run_server(state: ServerState, shutdown: CancellationToken) -> Result<()> {
    let address = format!("{}:{}", state.config.host, state.config.port);
    let app = make_app(state);

    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {}", address))?;
    info!("Listening on {}", address);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    info!("HTTP server stopped");
    Ok(())
}
