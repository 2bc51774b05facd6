//! Download queue module
//!
//! Persistent, deduplicated lists of artists, albums and tracks waiting to
//! be (re)downloaded, ordered by staleness.

mod legacy_lists;
mod models;
mod queue_store;
mod schema;

pub use legacy_lists::{import_legacy_lists, LegacyImport};
pub use models::*;
pub use queue_store::{DownloadQueueStore, SqliteDownloadQueueStore};
pub use schema::DOWNLOAD_QUEUE_VERSIONED_SCHEMAS;
