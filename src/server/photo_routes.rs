//! Cached artist photo routes.

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::{info, warn};

use super::queue_routes::error_response;
use crate::server::state::GuardedArtworkCache;

const PHOTO_CACHE_CONTROL: &str = "public, max-age=86400";

#[derive(Debug, Serialize)]
pub struct PurgeResponse {
    pub success: bool,
    pub removed: usize,
    pub message: String,
}

fn purge_message(removed: usize) -> String {
    match removed {
        0 => "No cached photos found.".to_string(),
        1 => "Removed 1 cached photo.".to_string(),
        n => format!("Removed {} cached photos.", n),
    }
}

/// GET /photos/{id} - Serve a cached artist photo
pub async fn get_photo(
    State(artwork): State<GuardedArtworkCache>,
    Path(id): Path<String>,
) -> Response {
    match artwork.read_photo(&id).await {
        Ok(Some(photo)) => Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, photo.mime_type)
            .header(header::CONTENT_LENGTH, photo.data.len())
            .header(header::CACHE_CONTROL, PHOTO_CACHE_CONTROL)
            .header(header::CONTENT_DISPOSITION, "inline")
            .body(Body::from(photo.data))
            .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response()),
        Ok(None) => (StatusCode::NOT_FOUND, "Not Found").into_response(),
        Err(e) => {
            warn!("Failed to read cached photo {:?}: {}", id, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to read cached photo.",
            )
                .into_response()
        }
    }
}

/// POST /api/photos/purge - Delete every cached photo
pub async fn purge_photos(State(artwork): State<GuardedArtworkCache>) -> Response {
    match artwork.purge().await {
        Ok(removed) => {
            info!("Photo purge removed {} file(s)", removed);
            Json(PurgeResponse {
                success: true,
                removed,
                message: purge_message(removed),
            })
            .into_response()
        }
        Err(e) => {
            warn!("Photo purge failed: {}", e);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to purge cached photos.",
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_purge_message() {
        assert_eq!(purge_message(0), "No cached photos found.");
        assert_eq!(purge_message(1), "Removed 1 cached photo.");
        assert_eq!(purge_message(3), "Removed 3 cached photos.");
    }
}
