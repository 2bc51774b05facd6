//! Test server lifecycle management
//!
//! This module manages spawning and shutting down test HTTP servers.
//! Each test gets an isolated server with its own queue database, photo
//! cache and music directory.

use super::constants::*;
use async_trait::async_trait;
use axum::{extract::Path, http::header, response::IntoResponse, routing::get, Router};
use orpheus_queue_server::artwork::ArtworkCache;
use orpheus_queue_server::download_queue::{
    DownloadQueueStore, EntityKind, SqliteDownloadQueueStore,
};
use orpheus_queue_server::notifications::{Notification, NotificationSink};
use orpheus_queue_server::qobuz::{SearchCandidate, SearchError, SearchProvider};
use orpheus_queue_server::scheduler::{
    Downloader, DownloaderError, InvocationOutcome, QueueScheduler, RetryPolicy,
    SharedSchedulerStatus, CAPTCHA_MARKER,
};
use orpheus_queue_server::server::{make_app, RequestsLoggingLevel, ServerConfig};
use orpheus_queue_server::ServerState;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

/// Smallest byte sequence sniffed as a PNG image
pub const PNG_BYTES: &[u8] = &[
    0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, b'I', b'H', b'D', b'R',
];

/// Search provider answering every query with a fixed catalog
struct StubSearchProvider {
    image_base_url: String,
}

#[async_trait]
impl SearchProvider for StubSearchProvider {
    async fn search(
        &self,
        kind: EntityKind,
        query: &str,
        limit: usize,
    ) -> Result<Vec<SearchCandidate>, SearchError> {
        if query == FAILING_QUERY {
            return Err(SearchError::Upstream("upstream exploded".to_string()));
        }

        let mut results = match kind {
            EntityKind::Artist => vec![
                SearchCandidate {
                    id: PHOTO_ARTIST_ID.to_string(),
                    name: Some("Photo Artist".to_string()),
                    image: format!("{}/images/{}.png", self.image_base_url, PHOTO_ARTIST_ID),
                    ..Default::default()
                },
                SearchCandidate {
                    id: ARTIST_ID.to_string(),
                    name: Some(ARTIST_NAME.to_string()),
                    ..Default::default()
                },
            ],
            EntityKind::Album => vec![SearchCandidate {
                id: ALBUM_ID.to_string(),
                title: Some(ALBUM_TITLE.to_string()),
                artist: Some(ALBUM_ARTIST.to_string()),
                year: Some("2013".to_string()),
                ..Default::default()
            }],
            EntityKind::Track => vec![SearchCandidate {
                id: "999".to_string(),
                title: Some("Get Lucky".to_string()),
                artist: Some(ALBUM_ARTIST.to_string()),
                album: Some(ALBUM_TITLE.to_string()),
                album_id: Some(ALBUM_ID.to_string()),
                ..Default::default()
            }],
        };
        results.truncate(limit);
        Ok(results)
    }
}

/// Notification sink remembering every event it was handed
#[derive(Default)]
pub struct RecordingSink {
    notifications: Mutex<Vec<Notification>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<String> {
        self.notifications
            .lock()
            .unwrap()
            .iter()
            .map(|n| n.event.clone())
            .collect()
    }

    pub fn count(&self, event: &str) -> usize {
        self.events().iter().filter(|e| e.as_str() == event).count()
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn notify(&self, notification: Notification) {
        self.notifications.lock().unwrap().push(notification);
    }
}

/// Downloader deciding the outcome from the entry id
///
/// Ids starting with [`CAPTCHA_ID_PREFIX`] hit a captcha, ids starting
/// with [`FAILING_ID_PREFIX`] fail, everything else succeeds.
#[derive(Default)]
pub struct StubDownloader {
    calls: Mutex<Vec<(EntityKind, String)>>,
}

impl StubDownloader {
    pub fn calls(&self) -> Vec<(EntityKind, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Downloader for StubDownloader {
    async fn download(
        &self,
        kind: EntityKind,
        id: &str,
    ) -> Result<InvocationOutcome, DownloaderError> {
        self.calls.lock().unwrap().push((kind, id.to_string()));
        let outcome = if id.starts_with(CAPTCHA_ID_PREFIX) {
            InvocationOutcome {
                success: false,
                exit_code: Some(1),
                output: format!("Login failed: {}", CAPTCHA_MARKER),
            }
        } else if id.starts_with(FAILING_ID_PREFIX) {
            InvocationOutcome {
                success: false,
                exit_code: Some(2),
                output: "Traceback: something broke".to_string(),
            }
        } else {
            InvocationOutcome {
                success: true,
                exit_code: Some(0),
                output: "Done".to_string(),
            }
        };
        Ok(outcome)
    }
}

/// Serves [`PNG_BYTES`] for any `/images/{file}` path, standing in for the
/// upstream image CDN.
async fn spawn_image_server(shutdown: CancellationToken) -> String {
    async fn image(Path(_file): Path<String>) -> impl IntoResponse {
        ([(header::CONTENT_TYPE, "image/png")], PNG_BYTES)
    }

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind image server");
    let port = listener
        .local_addr()
        .expect("Failed to get image server address")
        .port();
    let app = Router::new().route("/images/{file}", get(image));
    tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await
            .expect("Image server failed");
    });
    format!("http://127.0.0.1:{}", port)
}

/// Test server instance with isolated queue database
///
/// When dropped, the server (and scheduler, if any) shuts down and temp
/// resources are cleaned up.
pub struct TestServer {
    /// Base URL for making requests (e.g., "http://127.0.0.1:12345")
    pub base_url: String,

    /// The port the server is listening on
    pub port: u16,

    /// Queue store for direct database access in tests
    pub store: Arc<dyn DownloadQueueStore>,

    /// Every notification the server and scheduler emitted
    pub notifications: Arc<RecordingSink>,

    /// Downloader invocations, only populated when the scheduler runs
    pub downloader: Arc<StubDownloader>,

    /// Root of the downloaded music tree
    pub music_dir: PathBuf,

    /// Where artist photos are cached
    pub photo_dir: PathBuf,

    // Private fields - keep resources alive until drop
    _temp_dir: TempDir,
    shutdown: CancellationToken,
}

impl TestServer {
    /// Spawns a new test server on a random port, without a scheduler
    ///
    /// # Panics
    ///
    /// Panics if the database cannot be created, binding fails, or the
    /// server doesn't become ready within timeout.
    pub async fn spawn() -> Self {
        Self::spawn_inner(false).await
    }

    /// Spawns a test server with a scheduler draining the queue through
    /// [`StubDownloader`] on short intervals.
    pub async fn spawn_with_scheduler() -> Self {
        Self::spawn_inner(true).await
    }

    async fn spawn_inner(with_scheduler: bool) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("orpheusdl-container.db");
        let music_dir = temp_dir.path().join("music");
        let photo_dir = temp_dir.path().join("photos");
        std::fs::create_dir_all(&music_dir).expect("Failed to create music dir");

        let store: Arc<dyn DownloadQueueStore> = Arc::new(
            SqliteDownloadQueueStore::new(&db_path).expect("Failed to open queue store"),
        );
        let notifications = Arc::new(RecordingSink::default());
        let downloader = Arc::new(StubDownloader::default());
        let artwork =
            Arc::new(ArtworkCache::new(photo_dir.clone()).expect("Failed to create photo cache"));

        let shutdown = CancellationToken::new();
        let image_base_url = spawn_image_server(shutdown.clone()).await;

        let scheduler_status = if with_scheduler {
            let scheduler = QueueScheduler::new(
                store.clone(),
                downloader.clone(),
                notifications.clone(),
                RetryPolicy::new(Duration::from_millis(TEST_RETRY_DELAY_MS), None),
                Duration::from_millis(TEST_IDLE_INTERVAL_MS),
                Duration::from_millis(TEST_ENTRY_INTERVAL_MS),
            );
            let status = scheduler.status();
            let scheduler_shutdown = shutdown.clone();
            tokio::spawn(async move { scheduler.run(scheduler_shutdown).await });
            status
        } else {
            SharedSchedulerStatus::default()
        };

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let port = listener
            .local_addr()
            .expect("Failed to get local address")
            .port();
        let base_url = format!("http://127.0.0.1:{}", port);

        let state = ServerState {
            config: ServerConfig {
                requests_logging_level: RequestsLoggingLevel::None,
                host: "127.0.0.1".to_string(),
                port,
                frontend_dir_path: None,
                music_dir: Some(music_dir.clone()),
            },
            start_time: Instant::now(),
            queue_store: store.clone(),
            scheduler_status,
            notifier: notifications.clone(),
            search_provider: Some(Arc::new(StubSearchProvider { image_base_url })),
            artwork,
            hash: "test".to_string(),
        };
        let app = make_app(state);

        let server_shutdown = shutdown.clone();
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move { server_shutdown.cancelled().await })
                .await
                .expect("Server failed");
        });

        let server = Self {
            base_url,
            port,
            store,
            notifications,
            downloader,
            music_dir,
            photo_dir,
            _temp_dir: temp_dir,
            shutdown,
        };

        server.wait_for_ready().await;

        server
    }

    /// Waits for the server to become ready by polling the / endpoint
    async fn wait_for_ready(&self) {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(100))
            .build()
            .expect("Failed to build reqwest client");

        let start = Instant::now();
        let timeout = Duration::from_millis(SERVER_READY_TIMEOUT_MS);

        loop {
            if start.elapsed() > timeout {
                panic!(
                    "Server did not become ready within {}ms",
                    SERVER_READY_TIMEOUT_MS
                );
            }

            match client.get(format!("{}/", self.base_url)).send().await {
                Ok(response) if response.status().is_success() => return,
                _ => {
                    tokio::time::sleep(Duration::from_millis(SERVER_READY_POLL_INTERVAL_MS)).await;
                }
            }
        }
    }

    /// Polls `condition` until it holds or [`SCHEDULER_WAIT_TIMEOUT_MS`] elapses.
    pub async fn wait_until<F>(&self, what: &str, mut condition: F)
    where
        F: FnMut() -> bool,
    {
        let start = Instant::now();
        while !condition() {
            if start.elapsed() > Duration::from_millis(SCHEDULER_WAIT_TIMEOUT_MS) {
                panic!("Timed out waiting for {}", what);
            }
            tokio::time::sleep(Duration::from_millis(SERVER_READY_POLL_INTERVAL_MS)).await;
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.cancel();
        // TempDir is cleaned up automatically
    }
}
