//! End-to-end tests for the queue endpoints
//!
//! Tests listing, adding and removing queue entries over HTTP against a
//! real SQLite store.

mod common;

use common::*;
use orpheus_queue_server::download_queue::{DownloadQueueStore, EntityKind};
use reqwest::StatusCode;
use serde_json::{json, Value};

#[tokio::test]
async fn test_empty_queue_lists_all_kinds() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    let response = client.list_queue().await;
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = response.json().await.unwrap();
    for kind in ["artist", "album", "track"] {
        assert_eq!(body[kind], json!([]), "{} list should be empty", kind);
    }
}

#[tokio::test]
async fn test_add_artist_shows_never_checked() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    let response = client.add_artist(ARTIST_ID, ARTIST_NAME).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], format!("Added artist '{}'.", ARTIST_NAME));
    assert_eq!(body["entry"]["id"], ARTIST_ID);
    assert!(body["entry"]["last_checked_at"].is_null());

    let entries = client.entries("artist").await;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["index"], 0);
    assert_eq!(entries[0]["name"], ARTIST_NAME);
    assert_eq!(entries[0]["last_checked"], "Never");
}

#[tokio::test]
async fn test_add_trims_identifier_and_details() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    let response = client
        .add_entry(
            "album",
            json!({ "id": "  456  ", "title": " Discovery ", "artist": "Daft Punk" }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let entries = client.entries("album").await;
    assert_eq!(entries[0]["id"], "456");
    assert_eq!(entries[0]["title"], "Discovery");
}

#[tokio::test]
async fn test_duplicate_add_is_conflict_and_keeps_original() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    let first = client.add_artist(ARTIST_ID, ARTIST_NAME).await;
    assert_eq!(first.status(), StatusCode::CREATED);

    let second = client.add_artist(ARTIST_ID, "Renamed").await;
    assert_eq!(second.status(), StatusCode::CONFLICT);
    let body: Value = second.json().await.unwrap();
    assert_eq!(body["error"], "Artist already present.");

    let entries = client.entries("artist").await;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["name"], ARTIST_NAME);
}

#[tokio::test]
async fn test_invalid_identifiers_are_rejected() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    for (id, reason) in [
        ("   ", "Value cannot be empty."),
        ("#123", "Entries starting with '#' are ignored by the scheduler."),
        ("../etc", "Identifier contains path characters."),
    ] {
        let response = client.add_entry("track", json!({ "id": id })).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "id {:?}", id);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["error"], reason);
    }

    assert!(client.entries("track").await.is_empty());
}

#[tokio::test]
async fn test_unknown_kind_and_invalid_json() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    let response = client.list_kind("playlist").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Unknown list type.");

    let response = client
        .client
        .post(format!("{}/api/queue/artist", server.base_url))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Invalid JSON body.");
}

#[tokio::test]
async fn test_plural_kind_aliases() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    let response = client
        .add_entry("albums", json!({ "id": ALBUM_ID, "title": ALBUM_TITLE }))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let body: Value = client.list_kind("album").await.json().await.unwrap();
    assert_eq!(body["kind"], "album");
    assert_eq!(body["entries"][0]["id"], ALBUM_ID);
}

#[tokio::test]
async fn test_remove_by_id_notifies_and_deletes_artist_folder() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    let artist_dir = server.music_dir.join(ARTIST_NAME);
    std::fs::create_dir_all(artist_dir.join("Album")).unwrap();
    std::fs::write(artist_dir.join("Album").join("01.flac"), b"audio").unwrap();

    client.add_artist(ARTIST_ID, ARTIST_NAME).await;

    let response = client.remove_by_id("artist", ARTIST_ID).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["entry"]["id"], ARTIST_ID);

    assert!(client.entries("artist").await.is_empty());
    assert!(!artist_dir.exists());
    assert!(server.music_dir.exists());

    server
        .wait_until("entry notifications", || {
            server.notifications.count("entry_added") == 1
                && server.notifications.count("entry_removed") == 1
        })
        .await;
}

#[tokio::test]
async fn test_remove_missing_entry_is_not_found_and_leaves_queue() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    client.add_artist(ARTIST_ID, ARTIST_NAME).await;

    let response = client.remove_by_id("artist", "does-not-exist").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Entry not found.");

    let response = client.remove_by_index("artist", json!(5), None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = client.remove_by_index("artist", json!(-1), None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = client.remove_by_index("artist", json!("abc"), None).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Invalid entry index.");

    assert_eq!(client.entries("artist").await.len(), 1);
    assert_eq!(server.notifications.count("entry_removed"), 0);
}

#[tokio::test]
async fn test_remove_by_index_follows_display_order() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    for (id, name) in [("1", "First"), ("2", "Second"), ("3", "Third")] {
        client.add_artist(id, name).await;
    }
    let listed: Vec<String> = client
        .entries("artist")
        .await
        .iter()
        .map(|e| e["id"].as_str().unwrap().to_string())
        .collect();

    let response = client
        .remove_by_index("artist", json!("1"), Some(&listed[1]))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["entry"]["id"], listed[1].as_str());

    let remaining: Vec<Value> = client
        .entries("artist")
        .await
        .iter()
        .map(|e| e["id"].clone())
        .collect();
    assert_eq!(remaining, vec![json!(listed[0]), json!(listed[2])]);
}

#[tokio::test]
async fn test_remove_by_stale_index_is_refused() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    client.add_artist("1", "First").await;
    client.add_artist("2", "Second").await;
    let listed = client.entries("artist").await;
    let first_id = listed[0]["id"].as_str().unwrap().to_string();

    // Another client removes the first entry, so index 0 now holds "2".
    assert_eq!(
        client.remove_by_id("artist", &first_id).await.status(),
        StatusCode::OK
    );

    let response = client
        .remove_by_index("artist", json!(0), Some(&first_id))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let remaining = client.entries("artist").await;
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0]["id"], "2");
}

#[tokio::test]
async fn test_concurrent_adds_of_same_id_insert_once() {
    let server = TestServer::spawn().await;

    let mut tasks = tokio::task::JoinSet::new();
    for _ in 0..8 {
        let client = TestClient::new(server.base_url.clone());
        tasks.spawn(async move {
            client
                .select_json("track", json!({ "id": "999", "title": "Get Lucky" }))
                .await
                .status()
        });
    }

    let mut created = 0;
    let mut conflicts = 0;
    while let Some(status) = tasks.join_next().await {
        match status.unwrap() {
            StatusCode::OK => created += 1,
            StatusCode::CONFLICT => conflicts += 1,
            other => panic!("Unexpected status {}", other),
        }
    }
    assert_eq!(created, 1);
    assert_eq!(conflicts, 7);

    let counts = server.store.counts().unwrap();
    assert_eq!(counts.track, 1);
}

#[tokio::test]
async fn test_added_entry_is_persisted_unchecked() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    client.add_artist(ARTIST_ID, ARTIST_NAME).await;
    let entry = server
        .store
        .get_entry(EntityKind::Artist, ARTIST_ID)
        .unwrap()
        .unwrap();
    assert_eq!(entry.details.name.as_deref(), Some(ARTIST_NAME));
    assert_eq!(entry.last_checked_at, None);
}
