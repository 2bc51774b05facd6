//! Orpheus Queue Server Library
//!
//! Persistent download queue, the scheduler that drains it through an
//! external downloader, and the HTTP API in front of both.

pub mod artwork;
pub mod cli_style;
pub mod config;
pub mod download_queue;
pub mod music_library;
pub mod notifications;
pub mod qobuz;
pub mod scheduler;
pub mod server;
pub mod sqlite_persistence;

// Re-export commonly used types for convenience
pub use download_queue::{DownloadQueueStore, SqliteDownloadQueueStore};
pub use server::{make_app, run_server, RequestsLoggingLevel, ServerState};
