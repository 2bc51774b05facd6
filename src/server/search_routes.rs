//! Catalog search and selection routes.
//!
//! `/api/{kind}-search` proxies the search provider, `/api/{kind}-select`
//! queues a picked result. Selections accept JSON or form bodies.

use axum::{
    body::Body,
    extract::{FromRequest, Query, Request, State},
    http::{header::CONTENT_TYPE, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use tokio::task::JoinSet;
use tracing::{info, warn};

use super::queue_routes::{add_to_queue, error_response};
use crate::download_queue::{EntityKind, EntryDetails};
use crate::qobuz::{SearchCandidate, SearchError};
use crate::server::state::{GuardedArtworkCache, ServerState};

const DEFAULT_SEARCH_LIMIT: usize = 10;

// =============================================================================
// Request/Response Types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
    /// Kept raw so that garbage falls back to the default.
    #[serde(default)]
    pub limit: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub results: Vec<SearchCandidate>,
}

#[derive(Debug, Serialize)]
pub struct SelectResponse {
    pub success: bool,
    pub message: String,
    pub redirect: String,
}

fn parse_limit(raw: Option<&str>) -> usize {
    raw.and_then(|s| s.trim().parse::<i64>().ok())
        .filter(|n| *n > 0)
        .map(|n| n as usize)
        .unwrap_or(DEFAULT_SEARCH_LIMIT)
}

/// Home page location carrying a flash message and the selected list.
pub fn redirect_location(message: &str, kind: EntityKind) -> String {
    format!(
        "/?message={}&list={}",
        urlencoding::encode(message),
        kind.as_str()
    )
}

// =============================================================================
// Search
// =============================================================================

/// Fills in `photo` for artist candidates, caching each picture once.
async fn attach_artist_photos(
    artwork: &GuardedArtworkCache,
    mut candidates: Vec<SearchCandidate>,
) -> Vec<SearchCandidate> {
    let mut tasks = JoinSet::new();
    for (index, candidate) in candidates.iter().enumerate() {
        let artwork = artwork.clone();
        let id = candidate.id.clone();
        let image = candidate.image.clone();
        tasks.spawn(async move {
            let image = (!image.is_empty()).then_some(image.as_str());
            (index, artwork.ensure_photo(&id, image).await)
        });
    }
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((index, photo)) => candidates[index].photo = photo,
            Err(e) => warn!("Artist photo task failed: {}", e),
        }
    }
    candidates
}

async fn search(state: ServerState, kind: EntityKind, query: SearchQuery) -> Response {
    let q = query.q.trim();
    let limit = parse_limit(query.limit.as_deref());
    info!(
        "Received {} search request with query={:?} limit={}",
        kind, q, limit
    );
    if q.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "Missing search query.");
    }
    let Some(provider) = state.search_provider.as_ref() else {
        return error_response(StatusCode::SERVICE_UNAVAILABLE, "Search is not configured.");
    };

    let results = match provider.search(kind, q, limit).await {
        Ok(results) => results,
        Err(e) => {
            let status = match e {
                SearchError::NotConfigured(_) => StatusCode::SERVICE_UNAVAILABLE,
                SearchError::Timeout | SearchError::Upstream(_) => StatusCode::BAD_GATEWAY,
            };
            warn!(
                "{} search for query {:?} failed with status {}: {}",
                kind, q, status, e
            );
            return error_response(status, e.to_string());
        }
    };

    let results = if kind == EntityKind::Artist {
        attach_artist_photos(&state.artwork, results).await
    } else {
        results
    };

    info!(
        "{} search for query {:?} returning {} result(s)",
        kind,
        q,
        results.len()
    );
    Json(SearchResponse { results }).into_response()
}

async fn artist_search(State(state): State<ServerState>, Query(q): Query<SearchQuery>) -> Response {
    search(state, EntityKind::Artist, q).await
}

async fn album_search(State(state): State<ServerState>, Query(q): Query<SearchQuery>) -> Response {
    search(state, EntityKind::Album, q).await
}

async fn track_search(State(state): State<ServerState>, Query(q): Query<SearchQuery>) -> Response {
    search(state, EntityKind::Track, q).await
}

// =============================================================================
// Select
// =============================================================================

/// Flattens a JSON object into string fields; scalars are stringified and
/// anything else becomes empty.
fn json_fields(payload: Value) -> Option<HashMap<String, String>> {
    let Value::Object(map) = payload else {
        return None;
    };
    Some(
        map.into_iter()
            .map(|(key, value)| {
                let value = match value {
                    Value::String(s) => s,
                    Value::Number(n) => n.to_string(),
                    Value::Bool(b) => b.to_string(),
                    _ => String::new(),
                };
                (key, value)
            })
            .collect(),
    )
}

/// Reads a selection body as JSON or as a urlencoded form.
async fn read_fields(request: Request<Body>) -> Result<HashMap<String, String>, Response> {
    let is_json = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| {
            v.split(';')
                .next()
                .unwrap_or_default()
                .trim()
                .eq_ignore_ascii_case("application/json")
        })
        .unwrap_or(false);

    if is_json {
        let Json(payload) = Json::<Value>::from_request(request, &())
            .await
            .map_err(|_| error_response(StatusCode::BAD_REQUEST, "Invalid JSON body."))?;
        json_fields(payload)
            .ok_or_else(|| error_response(StatusCode::BAD_REQUEST, "Invalid request payload."))
    } else {
        let Form(fields) = Form::<HashMap<String, String>>::from_request(request, &())
            .await
            .map_err(|_| error_response(StatusCode::BAD_REQUEST, "Invalid request payload."))?;
        Ok(fields)
    }
}

fn field(fields: &HashMap<String, String>, key: &str) -> String {
    fields
        .get(key)
        .map(|v| v.trim().to_string())
        .unwrap_or_default()
}

fn details_for(kind: EntityKind, fields: &HashMap<String, String>) -> EntryDetails {
    match kind {
        EntityKind::Artist => EntryDetails::artist(field(fields, "name")),
        EntityKind::Album => EntryDetails::album(field(fields, "title"), field(fields, "artist")),
        EntityKind::Track => EntryDetails::track(
            field(fields, "title"),
            field(fields, "artist"),
            field(fields, "album"),
            field(fields, "album_id"),
        ),
    }
}

fn select_message(kind: EntityKind, id: &str, label: &str) -> String {
    if label.is_empty() || label == id {
        format!("Added {} ID {} to the download queue.", kind, id)
    } else {
        format!("Added {} '{}' (ID {}) to the download queue.", kind, label, id)
    }
}

async fn select(state: ServerState, kind: EntityKind, request: Request<Body>) -> Response {
    let fields = match read_fields(request).await {
        Ok(fields) => fields,
        Err(response) => return response,
    };

    let id = field(&fields, "id");
    info!("Received {} selection with id={:?}", kind, id);
    if id.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, format!("Missing {} id.", kind));
    }

    let entry = match add_to_queue(&state, kind, &id, details_for(kind, &fields)) {
        Ok(entry) => entry,
        Err(response) => return response,
    };

    let message = select_message(kind, &entry.id, &entry.label());
    Json(SelectResponse {
        success: true,
        redirect: redirect_location(&message, kind),
        message,
    })
    .into_response()
}

async fn artist_select(State(state): State<ServerState>, request: Request<Body>) -> Response {
    select(state, EntityKind::Artist, request).await
}

async fn album_select(State(state): State<ServerState>, request: Request<Body>) -> Response {
    select(state, EntityKind::Album, request).await
}

async fn track_select(State(state): State<ServerState>, request: Request<Body>) -> Response {
    select(state, EntityKind::Track, request).await
}

pub fn search_routes() -> Router<ServerState> {
    Router::new()
        .route("/artist-search", get(artist_search))
        .route("/album-search", get(album_search))
        .route("/track-search", get(track_search))
        .route("/artist-select", post(artist_select))
        .route("/album-select", post(album_select))
        .route("/track-select", post(track_select))
}
