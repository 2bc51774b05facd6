//! Artist photo cache.
//!
//! Photos found during artist searches are downloaded once and stored in a
//! flat directory keyed by the provider's artist id, then served from
//! `/photos/{id}`.

use anyhow::{Context, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

const FETCH_TIMEOUT: Duration = Duration::from_secs(10);
const FALLBACK_MIME: &str = "application/octet-stream";

#[derive(Debug, Error)]
pub enum ArtworkError {
    #[error("Invalid photo identifier")]
    InvalidIdentifier,
    #[error("Failed to download photo: {0}")]
    Fetch(#[from] reqwest::Error),
    #[error("Photo response was empty")]
    EmptyResponse,
    #[error("Photo storage error: {0}")]
    Io(#[from] std::io::Error),
}

/// A cached photo ready to be served.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Photo {
    pub data: Vec<u8>,
    pub mime_type: &'static str,
}

pub struct ArtworkCache {
    dir: PathBuf,
    client: reqwest::Client,
    /// Serializes writes and purges.
    write_lock: Mutex<()>,
}

impl ArtworkCache {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .context("Failed to create artwork HTTP client")?;
        Ok(Self {
            dir: dir.into(),
            client,
            write_lock: Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Trimmed identifier safe to use as a file name, `None` otherwise.
    pub fn normalize_identifier(raw: &str) -> Option<String> {
        let id = raw.trim();
        if id.is_empty()
            || id.starts_with('.')
            || id.contains('/')
            || id.contains('\\')
            || id.contains("..")
        {
            return None;
        }
        Some(id.to_string())
    }

    /// Public URL under which a cached photo is served.
    pub fn photo_url(id: &str) -> String {
        format!("/photos/{}", urlencoding::encode(id))
    }

    fn path_for(&self, id: &str) -> PathBuf {
        self.dir.join(id)
    }

    async fn is_cached(&self, id: &str) -> bool {
        match tokio::fs::metadata(self.path_for(id)).await {
            Ok(meta) => meta.is_file() && meta.len() > 0,
            Err(_) => false,
        }
    }

    /// URL of the cached photo for `id`, if there is one.
    pub async fn cached_url(&self, id: &str) -> Option<String> {
        let id = Self::normalize_identifier(id)?;
        if self.is_cached(&id).await {
            Some(Self::photo_url(&id))
        } else {
            None
        }
    }

    /// Returns the cached photo URL, downloading `image_url` first if needed.
    /// Failures are logged and yield `None`.
    pub async fn ensure_photo(&self, id: &str, image_url: Option<&str>) -> Option<String> {
        let id = Self::normalize_identifier(id)?;
        if self.is_cached(&id).await {
            return Some(Self::photo_url(&id));
        }
        let image_url = image_url.map(str::trim).filter(|u| !u.is_empty())?;

        match self.fetch_and_store(&id, image_url).await {
            Ok(()) => Some(Self::photo_url(&id)),
            Err(ArtworkError::EmptyResponse) => {
                debug!("Artist photo response for {} was empty", id);
                None
            }
            Err(e) => {
                warn!(
                    "Failed to cache artist photo for {} from {}: {}",
                    id, image_url, e
                );
                None
            }
        }
    }

    async fn fetch_and_store(&self, id: &str, image_url: &str) -> Result<(), ArtworkError> {
        let data = self
            .client
            .get(image_url)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;
        if data.is_empty() {
            return Err(ArtworkError::EmptyResponse);
        }

        let _guard = self.write_lock.lock().await;
        if self.is_cached(id).await {
            return Ok(());
        }

        let dir = self.dir.clone();
        let path = self.path_for(id);
        tokio::task::spawn_blocking(move || -> Result<(), std::io::Error> {
            std::fs::create_dir_all(&dir)?;
            let mut temp = tempfile::NamedTempFile::new_in(&dir)?;
            temp.write_all(&data)?;
            temp.persist(&path).map_err(|e| e.error)?;
            Ok(())
        })
        .await
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))??;

        debug!("Cached artist photo for {}", id);
        Ok(())
    }

    /// Reads a cached photo. `Ok(None)` when absent, empty or the id is invalid.
    pub async fn read_photo(&self, id: &str) -> Result<Option<Photo>, ArtworkError> {
        let Some(id) = Self::normalize_identifier(id) else {
            return Ok(None);
        };
        let data = match tokio::fs::read(self.path_for(&id)).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        if data.is_empty() {
            return Ok(None);
        }
        let mime_type = detect_mime(&data);
        Ok(Some(Photo { data, mime_type }))
    }

    /// Deletes every cached photo, returning how many files were removed.
    pub async fn purge(&self) -> Result<usize, ArtworkError> {
        let _guard = self.write_lock.lock().await;

        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let mut removed = 0;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if !entry.file_type().await?.is_file() {
                continue;
            }
            match tokio::fs::remove_file(&path).await {
                Ok(()) => removed += 1,
                Err(e) => warn!("Failed to remove cached photo {:?}: {}", path, e),
            }
        }
        info!("Removed {} cached photo(s) from {:?}", removed, self.dir);
        Ok(removed)
    }
}

/// Sniffs an image content type from its magic bytes.
pub fn detect_mime(data: &[u8]) -> &'static str {
    match infer::get(data) {
        Some(kind) if kind.mime_type().starts_with("image/") => kind.mime_type(),
        _ => FALLBACK_MIME,
    }
}
