//! Database schema for the download queue.
//!
//! Version 0 is the original three-table layout. Version 1 adds
//! `last_checked_at` to every table plus the indices used by the
//! staleness ordering.

use crate::sqlite_column;
use crate::sqlite_persistence::{Column, SqlType, Table, VersionedSchema, DEFAULT_TIMESTAMP};
use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

// =============================================================================
// Version 0
// =============================================================================

const ARTISTS_TABLE_V0: Table = Table {
    name: "artists",
    columns: &[
        sqlite_column!("id", &SqlType::Text, is_primary_key = true),
        sqlite_column!("name", &SqlType::Text),
        sqlite_column!(
            "created_at",
            &SqlType::Integer,
            non_null = true,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    indices: &[],
};

const ALBUMS_TABLE_V0: Table = Table {
    name: "albums",
    columns: &[
        sqlite_column!("id", &SqlType::Text, is_primary_key = true),
        sqlite_column!("title", &SqlType::Text),
        sqlite_column!("artist", &SqlType::Text),
        sqlite_column!(
            "created_at",
            &SqlType::Integer,
            non_null = true,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    indices: &[],
};

const TRACKS_TABLE_V0: Table = Table {
    name: "tracks",
    columns: &[
        sqlite_column!("id", &SqlType::Text, is_primary_key = true),
        sqlite_column!("title", &SqlType::Text),
        sqlite_column!("artist", &SqlType::Text),
        sqlite_column!("album", &SqlType::Text),
        sqlite_column!("album_id", &SqlType::Text),
        sqlite_column!(
            "created_at",
            &SqlType::Integer,
            non_null = true,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    indices: &[],
};

// =============================================================================
// Version 1
// =============================================================================

const LAST_CHECKED_AT_COLUMN: Column<'static, &'static str> =
    sqlite_column!("last_checked_at", &SqlType::Integer);

const ARTISTS_TABLE_V1: Table = Table {
    name: "artists",
    columns: &[
        sqlite_column!("id", &SqlType::Text, is_primary_key = true),
        sqlite_column!("name", &SqlType::Text),
        sqlite_column!(
            "created_at",
            &SqlType::Integer,
            non_null = true,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
        LAST_CHECKED_AT_COLUMN,
    ],
    indices: &[
        ("idx_artists_created_at", "created_at"),
        ("idx_artists_staleness", "last_checked_at, created_at"),
    ],
};

const ALBUMS_TABLE_V1: Table = Table {
    name: "albums",
    columns: &[
        sqlite_column!("id", &SqlType::Text, is_primary_key = true),
        sqlite_column!("title", &SqlType::Text),
        sqlite_column!("artist", &SqlType::Text),
        sqlite_column!(
            "created_at",
            &SqlType::Integer,
            non_null = true,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
        LAST_CHECKED_AT_COLUMN,
    ],
    indices: &[
        ("idx_albums_created_at", "created_at"),
        ("idx_albums_staleness", "last_checked_at, created_at"),
    ],
};

const TRACKS_TABLE_V1: Table = Table {
    name: "tracks",
    columns: &[
        sqlite_column!("id", &SqlType::Text, is_primary_key = true),
        sqlite_column!("title", &SqlType::Text),
        sqlite_column!("artist", &SqlType::Text),
        sqlite_column!("album", &SqlType::Text),
        sqlite_column!("album_id", &SqlType::Text),
        sqlite_column!(
            "created_at",
            &SqlType::Integer,
            non_null = true,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
        LAST_CHECKED_AT_COLUMN,
    ],
    indices: &[
        ("idx_tracks_created_at", "created_at"),
        ("idx_tracks_staleness", "last_checked_at, created_at"),
    ],
};

/// Adds `last_checked_at` where missing and creates the staleness indices.
fn migrate_v0_to_v1(conn: &Connection) -> Result<()> {
    for table in [&ARTISTS_TABLE_V1, &ALBUMS_TABLE_V1, &TRACKS_TABLE_V1] {
        if table.add_column_if_missing(conn, &LAST_CHECKED_AT_COLUMN)? {
            info!("Added last_checked_at column to {}", table.name);
        }
        table.create_indices(conn)?;
    }
    Ok(())
}

pub const DOWNLOAD_QUEUE_VERSIONED_SCHEMAS: &[VersionedSchema] = &[
    VersionedSchema {
        version: 0,
        tables: &[ARTISTS_TABLE_V0, ALBUMS_TABLE_V0, TRACKS_TABLE_V0],
        migration: None,
    },
    VersionedSchema {
        version: 1,
        tables: &[ARTISTS_TABLE_V1, ALBUMS_TABLE_V1, TRACKS_TABLE_V1],
        migration: Some(migrate_v0_to_v1),
    },
];
