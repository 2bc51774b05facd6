//! HTTP client for end-to-end tests
//!
//! This module wraps reqwest and provides one method per queue-server
//! endpoint.
//!
//! When API routes or request formats change, update only this file.

use super::constants::*;
use reqwest::Response;
use serde_json::{json, Value};
use std::time::Duration;

pub struct TestClient {
    /// The underlying reqwest client (public for custom requests in tests)
    pub client: reqwest::Client,
    /// The base URL of the test server
    pub base_url: String,
}

impl TestClient {
    pub fn new(base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("Failed to build reqwest client");

        Self { client, base_url }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    // ========================================================================
    // Status
    // ========================================================================

    /// GET /api/status
    pub async fn get_status(&self) -> Response {
        self.client
            .get(self.url("/api/status"))
            .send()
            .await
            .expect("Status request failed")
    }

    /// GET /metrics
    pub async fn get_metrics(&self) -> Response {
        self.client
            .get(self.url("/metrics"))
            .send()
            .await
            .expect("Metrics request failed")
    }

    // ========================================================================
    // Queue
    // ========================================================================

    /// GET /api/queue
    pub async fn list_queue(&self) -> Response {
        self.client
            .get(self.url("/api/queue"))
            .send()
            .await
            .expect("List queue request failed")
    }

    /// GET /api/queue/{kind}
    pub async fn list_kind(&self, kind: &str) -> Response {
        self.client
            .get(self.url(&format!("/api/queue/{}", kind)))
            .send()
            .await
            .expect("List kind request failed")
    }

    /// GET /api/queue/{kind}, returning the `entries` array
    pub async fn entries(&self, kind: &str) -> Vec<Value> {
        let body: Value = self
            .list_kind(kind)
            .await
            .json()
            .await
            .expect("Queue listing was not JSON");
        body["entries"]
            .as_array()
            .cloned()
            .expect("Queue listing has no entries array")
    }

    /// POST /api/queue/{kind}
    pub async fn add_entry(&self, kind: &str, body: Value) -> Response {
        self.client
            .post(self.url(&format!("/api/queue/{}", kind)))
            .json(&body)
            .send()
            .await
            .expect("Add entry request failed")
    }

    /// POST /api/queue/artist with just an id and name
    pub async fn add_artist(&self, id: &str, name: &str) -> Response {
        self.add_entry("artist", json!({ "id": id, "name": name }))
            .await
    }

    /// DELETE /api/queue/{kind}/{id}
    pub async fn remove_by_id(&self, kind: &str, id: &str) -> Response {
        self.client
            .delete(self.url(&format!(
                "/api/queue/{}/{}",
                kind,
                urlencoding::encode(id)
            )))
            .send()
            .await
            .expect("Remove by id request failed")
    }

    /// POST /api/queue/{kind}/delete
    pub async fn remove_by_index(&self, kind: &str, index: Value, id: Option<&str>) -> Response {
        let mut body = json!({ "index": index });
        if let Some(id) = id {
            body["id"] = json!(id);
        }
        self.client
            .post(self.url(&format!("/api/queue/{}/delete", kind)))
            .json(&body)
            .send()
            .await
            .expect("Remove by index request failed")
    }

    // ========================================================================
    // Search & Select
    // ========================================================================

    /// GET /api/{kind}-search?q=...
    pub async fn search(&self, kind: &str, query: &str, limit: Option<&str>) -> Response {
        let mut params = vec![("q", query)];
        if let Some(limit) = limit {
            params.push(("limit", limit));
        }
        self.client
            .get(self.url(&format!("/api/{}-search", kind)))
            .query(&params)
            .send()
            .await
            .expect("Search request failed")
    }

    /// POST /api/{kind}-select with a JSON body
    pub async fn select_json(&self, kind: &str, body: Value) -> Response {
        self.client
            .post(self.url(&format!("/api/{}-select", kind)))
            .json(&body)
            .send()
            .await
            .expect("Select request failed")
    }

    /// POST /api/{kind}-select with a urlencoded form body
    pub async fn select_form(&self, kind: &str, fields: &[(&str, &str)]) -> Response {
        self.client
            .post(self.url(&format!("/api/{}-select", kind)))
            .form(fields)
            .send()
            .await
            .expect("Select request failed")
    }

    // ========================================================================
    // Photos
    // ========================================================================

    /// GET /photos/{id}
    pub async fn get_photo(&self, id: &str) -> Response {
        self.client
            .get(self.url(&format!("/photos/{}", id)))
            .send()
            .await
            .expect("Photo request failed")
    }

    /// POST /api/photos/purge
    pub async fn purge_photos(&self) -> Response {
        self.client
            .post(self.url("/api/photos/purge"))
            .send()
            .await
            .expect("Purge request failed")
    }
}
