//! Qobuz catalog search.

mod client;
mod models;

pub use client::{
    QobuzCredentials, QobuzSearchClient, SearchError, SearchProvider, QOBUZ_API_BASE,
};
pub use models::{parse_albums, parse_artists, parse_tracks, SearchCandidate};
