//! HTTP client for the Qobuz catalog search.

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

use super::models::{parse_albums, parse_artists, parse_tracks, SearchCandidate};
use crate::download_queue::EntityKind;

pub const QOBUZ_API_BASE: &str = "https://www.qobuz.com/api.json/0.2";
const SEARCH_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SearchError {
    /// Credentials are missing.
    #[error("{0}")]
    NotConfigured(String),
    #[error("Qobuz search timed out.")]
    Timeout,
    #[error("{0}")]
    Upstream(String),
}

/// Catalog search used to find things worth queueing.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(
        &self,
        kind: EntityKind,
        query: &str,
        limit: usize,
    ) -> Result<Vec<SearchCandidate>, SearchError>;
}

/// Qobuz credentials. Only the app id is mandatory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QobuzCredentials {
    pub app_id: Option<String>,
    pub user_auth_token: Option<String>,
}

pub struct QobuzSearchClient {
    client: reqwest::Client,
    base_url: String,
    credentials: QobuzCredentials,
}

impl QobuzSearchClient {
    /// Create a new search client.
    ///
    /// # Arguments
    /// * `base_url` - API root, e.g. "https://www.qobuz.com/api.json/0.2"
    /// * `credentials` - app id and optional user token
    pub fn new(base_url: &str, credentials: QobuzCredentials) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(SEARCH_TIMEOUT)
            .build()?;

        let credentials = QobuzCredentials {
            app_id: credentials.app_id.filter(|v| !v.trim().is_empty()),
            user_auth_token: credentials.user_auth_token.filter(|v| !v.trim().is_empty()),
        };
        info!(
            "Qobuz search credentials: app_id={} token={}",
            if credentials.app_id.is_some() { "set" } else { "missing" },
            if credentials.user_auth_token.is_some() { "set" } else { "missing" },
        );

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
        })
    }

    async fn search_raw(&self, kind: EntityKind, query: &str, limit: usize) -> Result<Value, SearchError> {
        let app_id = self
            .credentials
            .app_id
            .as_deref()
            .ok_or_else(|| SearchError::NotConfigured("Qobuz app_id is not configured.".to_string()))?;

        let url = format!("{}/{}/search", self.base_url, kind.as_str());
        let limit = limit.to_string();
        let mut request = self
            .client
            .get(&url)
            .query(&[("query", query), ("limit", limit.as_str())])
            .header("X-App-Id", app_id);
        if let Some(token) = &self.credentials.user_auth_token {
            request = request.header("X-User-Auth-Token", token);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                warn!("Qobuz {} search timed out for query {:?}", kind, query);
                SearchError::Timeout
            } else {
                warn!("Qobuz {} search failed for query {:?}: {}", kind, query, e);
                SearchError::Upstream("Unable to reach Qobuz search endpoint.".to_string())
            }
        })?;

        let status = response.status();
        let body: Value = response.json().await.map_err(|e| {
            if e.is_timeout() {
                SearchError::Timeout
            } else {
                SearchError::Upstream(format!("Invalid Qobuz response (status {}).", status))
            }
        })?;

        if !status.is_success() {
            return Err(SearchError::Upstream(error_detail(&body).unwrap_or_else(
                || format!("Qobuz search failed with status {}.", status),
            )));
        }
        Ok(body)
    }
}

/// Message carried by a Qobuz error body.
fn error_detail(body: &Value) -> Option<String> {
    ["message", "error", "code"].iter().find_map(|key| match body.get(*key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

#[async_trait]
impl SearchProvider for QobuzSearchClient {
    async fn search(
        &self,
        kind: EntityKind,
        query: &str,
        limit: usize,
    ) -> Result<Vec<SearchCandidate>, SearchError> {
        let limit = if limit == 0 { 10 } else { limit };
        info!(
            "Starting Qobuz {} search for query {:?} with limit {}",
            kind, query, limit
        );

        let body = self.search_raw(kind, query, limit).await?;
        let results = match kind {
            EntityKind::Artist => parse_artists(&body),
            EntityKind::Album => parse_albums(&body),
            EntityKind::Track => parse_tracks(&body),
        };

        info!(
            "Qobuz {} search for query {:?} returned {} result(s)",
            kind,
            query,
            results.len()
        );
        Ok(results)
    }
}
