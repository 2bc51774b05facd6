//! Queue HTTP routes.
//!
//! Provides endpoints for:
//! - Listing queued artists, albums and tracks
//! - Adding entries
//! - Removing entries by id or by (snapshot-checked) index

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::download_queue::{
    EntityKind, EntryDetails, InsertOutcome, QueueEntry, RemoveOutcome,
};
use crate::music_library::delete_artist_directory;
use crate::notifications::{notify_in_background, Notification, Severity};
use crate::server::metrics;
use crate::server::state::{GuardedQueueStore, ServerState};

// =============================================================================
// Request/Response Types
// =============================================================================

/// A queue entry as shown to clients, with its position in the list.
#[derive(Debug, Serialize)]
pub struct QueueEntryView<'a> {
    pub index: usize,
    #[serde(flatten)]
    pub entry: &'a QueueEntry,
    pub last_checked: String,
}

fn entry_views(entries: &[QueueEntry]) -> Vec<QueueEntryView<'_>> {
    entries
        .iter()
        .enumerate()
        .map(|(index, entry)| QueueEntryView {
            index,
            entry,
            last_checked: entry.last_checked_display(),
        })
        .collect()
}

#[derive(Debug, Deserialize)]
pub struct AddEntryBody {
    #[serde(default)]
    pub id: String,
    #[serde(flatten)]
    pub details: EntryDetails,
}

#[derive(Debug, Deserialize)]
pub struct RemoveByIndexBody {
    pub index: Option<Value>,
    /// Id the client saw at `index`; the removal is refused if it moved.
    #[serde(default)]
    pub id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MutationResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry: Option<QueueEntry>,
}

// =============================================================================
// Helpers
// =============================================================================

pub(super) fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

fn internal_error(context: &str, err: anyhow::Error) -> Response {
    warn!("{}: {:#}", context, err);
    error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error.")
}

fn parse_kind(raw: &str) -> Result<EntityKind, Response> {
    EntityKind::normalize(raw)
        .ok_or_else(|| error_response(StatusCode::BAD_REQUEST, "Unknown list type."))
}

/// Refreshes the queue gauges after a mutation.
pub(super) fn refresh_queue_metrics(store: &GuardedQueueStore) {
    match store.counts() {
        Ok(counts) => metrics::set_queue_counts(&counts),
        Err(e) => debug!("Failed to refresh queue metrics: {}", e),
    }
}

/// Inserts an entry, mapping each outcome to the status and message the
/// queue and select endpoints share.
pub(super) fn add_to_queue(
    state: &ServerState,
    kind: EntityKind,
    id: &str,
    details: EntryDetails,
) -> Result<QueueEntry, Response> {
    let outcome = state
        .queue_store
        .insert(kind, id, details)
        .map_err(|e| internal_error("Failed to insert queue entry", e))?;

    let entry = match outcome {
        InsertOutcome::Created(entry) => entry,
        InsertOutcome::AlreadyExisted => {
            return Err(error_response(
                StatusCode::CONFLICT,
                format!("{} already present.", kind.label()),
            ))
        }
        InsertOutcome::Rejected(reason) => {
            return Err(error_response(StatusCode::BAD_REQUEST, reason.to_string()))
        }
    };

    info!("Queued {} {} ({})", kind, entry.id, entry.label());
    refresh_queue_metrics(&state.queue_store);
    notify_in_background(
        &state.notifier,
        Notification::new(
            Severity::Info,
            "entry_added",
            format!("Queued {} '{}'.", kind, entry.label()),
        )
        .with_detail("Kind", kind.as_str())
        .with_detail("ID", entry.id.clone()),
    );
    Ok(entry)
}

async fn after_removal(state: &ServerState, entry: &QueueEntry) {
    refresh_queue_metrics(&state.queue_store);
    notify_in_background(
        &state.notifier,
        Notification::new(
            Severity::Info,
            "entry_removed",
            format!("Removed {} '{}'.", entry.kind, entry.label()),
        )
        .with_detail("Kind", entry.kind.as_str())
        .with_detail("ID", entry.id.clone()),
    );

    if entry.kind != EntityKind::Artist {
        return;
    }
    let (Some(music_dir), Some(name)) = (
        state.config.music_dir.clone(),
        entry.details.name.clone(),
    ) else {
        return;
    };
    if let Err(e) =
        tokio::task::spawn_blocking(move || delete_artist_directory(&music_dir, &name)).await
    {
        warn!("Artist directory cleanup task failed: {}", e);
    }
}

fn removed_response(entry: QueueEntry) -> Response {
    let message = format!("Removed {} '{}'.", entry.kind, entry.label());
    Json(MutationResponse {
        success: true,
        message,
        entry: Some(entry),
    })
    .into_response()
}

fn parse_index(raw: Option<&Value>) -> Option<i64> {
    match raw? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// GET /api/queue - Every queued entry, grouped by kind
async fn list_queue(State(store): State<GuardedQueueStore>) -> Response {
    match store.list_all() {
        Ok(snapshot) => Json(json!({
            "artist": entry_views(&snapshot.artist),
            "album": entry_views(&snapshot.album),
            "track": entry_views(&snapshot.track),
        }))
        .into_response(),
        Err(e) => internal_error("Failed to list queue", e),
    }
}

/// GET /api/queue/{kind} - Entries of one kind
async fn list_kind(
    State(store): State<GuardedQueueStore>,
    Path(kind): Path<String>,
) -> Response {
    let kind = match parse_kind(&kind) {
        Ok(kind) => kind,
        Err(response) => return response,
    };
    match store.list_kind(kind) {
        Ok(entries) => Json(json!({
            "kind": kind,
            "entries": entry_views(&entries),
        }))
        .into_response(),
        Err(e) => internal_error("Failed to list queue", e),
    }
}

/// POST /api/queue/{kind} - Add an entry
async fn add_entry(
    State(state): State<ServerState>,
    Path(kind): Path<String>,
    body: Result<Json<AddEntryBody>, JsonRejection>,
) -> Response {
    let kind = match parse_kind(&kind) {
        Ok(kind) => kind,
        Err(response) => return response,
    };
    let Ok(Json(body)) = body else {
        return error_response(StatusCode::BAD_REQUEST, "Invalid JSON body.");
    };

    match add_to_queue(&state, kind, &body.id, body.details) {
        Ok(entry) => {
            let message = format!("Added {} '{}'.", kind, entry.label());
            (
                StatusCode::CREATED,
                Json(MutationResponse {
                    success: true,
                    message,
                    entry: Some(entry),
                }),
            )
                .into_response()
        }
        Err(response) => response,
    }
}

/// DELETE /api/queue/{kind}/{id} - Remove an entry by id
async fn remove_by_id(
    State(state): State<ServerState>,
    Path((kind, id)): Path<(String, String)>,
) -> Response {
    let kind = match parse_kind(&kind) {
        Ok(kind) => kind,
        Err(response) => return response,
    };

    match state.queue_store.remove_by_id(kind, &id) {
        Ok(RemoveOutcome::Removed(entry)) => {
            after_removal(&state, &entry).await;
            removed_response(entry)
        }
        Ok(RemoveOutcome::NotFound) => error_response(StatusCode::NOT_FOUND, "Entry not found."),
        Err(e) => internal_error("Failed to remove queue entry", e),
    }
}

/// POST /api/queue/{kind}/delete - Remove the entry at a list position
async fn remove_by_index(
    State(state): State<ServerState>,
    Path(kind): Path<String>,
    body: Result<Json<RemoveByIndexBody>, JsonRejection>,
) -> Response {
    let kind = match parse_kind(&kind) {
        Ok(kind) => kind,
        Err(response) => return response,
    };
    let Ok(Json(body)) = body else {
        return error_response(StatusCode::BAD_REQUEST, "Invalid JSON body.");
    };
    let Some(index) = parse_index(body.index.as_ref()) else {
        return error_response(StatusCode::BAD_REQUEST, "Invalid entry index.");
    };
    let Ok(index) = usize::try_from(index) else {
        return error_response(StatusCode::NOT_FOUND, "Entry not found.");
    };

    let expected_id = body.id.as_deref().map(str::trim).filter(|s| !s.is_empty());
    match state.queue_store.remove_by_index(kind, index, expected_id) {
        Ok(RemoveOutcome::Removed(entry)) => {
            after_removal(&state, &entry).await;
            removed_response(entry)
        }
        Ok(RemoveOutcome::NotFound) => error_response(StatusCode::NOT_FOUND, "Entry not found."),
        Err(e) => internal_error("Failed to remove queue entry", e),
    }
}

pub fn queue_routes() -> Router<ServerState> {
    Router::new()
        .route("/", get(list_queue))
        .route("/{kind}", get(list_kind).post(add_entry))
        .route("/{kind}/delete", post(remove_by_index))
        .route("/{kind}/{id}", delete(remove_by_id))
}
