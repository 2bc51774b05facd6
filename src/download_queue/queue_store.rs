//! Download queue storage and persistence.
//!
//! Provides SQLite-backed storage for the artist, album and track queues.

use super::models::*;
use super::schema::DOWNLOAD_QUEUE_VERSIONED_SCHEMAS;
use crate::sqlite_persistence::{read_schema_version, set_schema_version};
use anyhow::{anyhow, bail, Context, Result};
use rusqlite::{params, types::Type, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

/// Trait for download queue storage operations.
///
/// Every method is atomic with respect to every other: implementations
/// serialize access so that readers never observe a partially written row.
pub trait DownloadQueueStore: Send + Sync {
    // === Mutations ===

    /// Insert-or-ignore. Invalid identifiers are reported as
    /// [`InsertOutcome::Rejected`] and never stored.
    fn insert(&self, kind: EntityKind, id: &str, details: EntryDetails) -> Result<InsertOutcome>;

    /// Delete the entry with the given id.
    fn remove_by_id(&self, kind: EntityKind, id: &str) -> Result<RemoveOutcome>;

    /// Delete the entry at `index` of the kind's display order.
    ///
    /// When `expected_id` is given the row at `index` must carry that id,
    /// otherwise nothing is deleted and `NotFound` is returned. This guards
    /// against the list having changed since the caller rendered it.
    fn remove_by_index(
        &self,
        kind: EntityKind,
        index: usize,
        expected_id: Option<&str>,
    ) -> Result<RemoveOutcome>;

    /// Set `last_checked_at` to `checked_at`, never moving it backwards.
    /// Returns false if the entry does not exist (anymore).
    fn mark_checked_at(&self, kind: EntityKind, id: &str, checked_at: i64) -> Result<bool>;

    /// Set `last_checked_at` to the current time.
    fn mark_checked(&self, kind: EntityKind, id: &str) -> Result<bool> {
        self.mark_checked_at(kind, id, chrono::Utc::now().timestamp())
    }

    // === Queries ===

    fn get_entry(&self, kind: EntityKind, id: &str) -> Result<Option<QueueEntry>>;

    /// Entries of one kind ordered by creation time, then insertion order.
    fn list_kind(&self, kind: EntityKind) -> Result<Vec<QueueEntry>>;

    /// Entries of every kind, read in a single consistent snapshot.
    fn list_all(&self) -> Result<QueueSnapshot>;

    /// The globally stalest schedulable entry: never-checked first, then
    /// oldest-checked, then oldest-created. Ids rejected by
    /// `validate_entry_id` (blank, `#`-prefixed, path characters) are skipped.
    fn next_ready(&self) -> Result<Option<QueueEntry>>;

    fn counts(&self) -> Result<QueueCounts>;
}

/// SQLite-backed download queue store.
pub struct SqliteDownloadQueueStore {
    conn: Arc<Mutex<Connection>>,
}

const ARTIST_COLUMNS: &str =
    "id, name, NULL AS title, NULL AS artist, NULL AS album, NULL AS album_id, created_at, last_checked_at";
const ALBUM_COLUMNS: &str =
    "id, NULL AS name, title, artist, NULL AS album, NULL AS album_id, created_at, last_checked_at";
const TRACK_COLUMNS: &str =
    "id, NULL AS name, title, artist, album, album_id, created_at, last_checked_at";

fn select_columns(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Artist => ARTIST_COLUMNS,
        EntityKind::Album => ALBUM_COLUMNS,
        EntityKind::Track => TRACK_COLUMNS,
    }
}

/// Display order inside one kind table.
const DISPLAY_ORDER: &str = "ORDER BY created_at ASC, rowid ASC";

const NEXT_READY_QUERY: &str = r#"
    SELECT kind, id, name, title, artist, album, album_id, created_at, last_checked_at
    FROM (
        SELECT 'artist' AS kind, 0 AS kind_order, rowid AS row_order,
               id, name, NULL AS title, NULL AS artist, NULL AS album, NULL AS album_id,
               created_at, last_checked_at
        FROM artists
        UNION ALL
        SELECT 'album', 1, rowid,
               id, NULL, title, artist, NULL, NULL,
               created_at, last_checked_at
        FROM albums
        UNION ALL
        SELECT 'track', 2, rowid,
               id, NULL, title, artist, album, album_id,
               created_at, last_checked_at
        FROM tracks
    )
    ORDER BY (last_checked_at IS NOT NULL) ASC,
             last_checked_at ASC,
             created_at ASC,
             kind_order ASC,
             row_order ASC
"#;

impl SqliteDownloadQueueStore {
    /// Create a new SqliteDownloadQueueStore.
    ///
    /// Opens an existing database or creates a new one with the current schema.
    /// A database written before schema versioning existed is adopted as
    /// version 0: missing tables are created and the regular migrations run.
    ///
    /// # Arguments
    /// * `db_path` - Path to the SQLite database file
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let db_path = db_path.as_ref();
        let conn = if db_path.exists() {
            Connection::open_with_flags(
                db_path,
                rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                    | rusqlite::OpenFlags::SQLITE_OPEN_URI
                    | rusqlite::OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )
            .with_context(|| format!("Failed to open queue database at {:?}", db_path))?
        } else {
            if let Some(parent) = db_path.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create directory {:?}", parent))?;
            }
            let conn = Connection::open(db_path)
                .with_context(|| format!("Failed to create queue database at {:?}", db_path))?;
            DOWNLOAD_QUEUE_VERSIONED_SCHEMAS
                .last()
                .context("No schemas defined")?
                .create(&conn)?;
            info!("Created new download queue database at {:?}", db_path);
            conn
        };

        Self::initialize(&conn)?;

        Ok(SqliteDownloadQueueStore {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create an in-memory store for testing.
    #[cfg(test)]
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        DOWNLOAD_QUEUE_VERSIONED_SCHEMAS
            .last()
            .context("No schemas defined")?
            .create(&conn)?;

        Ok(SqliteDownloadQueueStore {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Brings an opened database to the latest schema. Safe to run on every start.
    fn initialize(conn: &Connection) -> Result<()> {
        let schema_count = DOWNLOAD_QUEUE_VERSIONED_SCHEMAS.len();

        let version = match read_schema_version(conn).context("Failed to read database version")? {
            None => {
                info!("Adopting unversioned download queue database as version 0");
                for table in DOWNLOAD_QUEUE_VERSIONED_SCHEMAS[0].tables {
                    table.create_if_missing(conn)?;
                }
                set_schema_version(conn, 0)?;
                0
            }
            Some(version) if version < 0 => bail!(
                "Download queue database version {} is too old, does not contain base db version",
                version
            ),
            Some(version) => {
                let version = version as usize;
                if version >= schema_count {
                    bail!(
                        "Download queue database version {} is too new (max supported: {})",
                        version,
                        schema_count - 1
                    );
                }
                DOWNLOAD_QUEUE_VERSIONED_SCHEMAS[version]
                    .validate(conn)
                    .with_context(|| {
                        format!("Download queue database does not match schema v{}", version)
                    })?;
                version
            }
        };

        Self::migrate_if_needed(conn, version)?;

        DOWNLOAD_QUEUE_VERSIONED_SCHEMAS
            .last()
            .context("No schemas defined")?
            .validate(conn)
            .context("Download queue database failed validation after migration")
    }

    /// Run any pending migrations.
    fn migrate_if_needed(conn: &Connection, current_version: usize) -> Result<()> {
        let target_version = DOWNLOAD_QUEUE_VERSIONED_SCHEMAS.len() - 1;
        if current_version >= target_version {
            return Ok(());
        }

        info!(
            "Migrating download queue database from version {} to {}",
            current_version, target_version
        );

        for schema in DOWNLOAD_QUEUE_VERSIONED_SCHEMAS.iter().skip(current_version + 1) {
            if let Some(migration_fn) = schema.migration {
                info!(
                    "Running download queue migration to version {}",
                    schema.version
                );
                migration_fn(conn)?;
            }
            set_schema_version(conn, schema.version)?;
        }

        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("Download queue connection mutex poisoned"))
    }

    /// Helper to convert a row from a single-kind query to a QueueEntry.
    fn row_to_entry(kind: EntityKind, row: &rusqlite::Row) -> rusqlite::Result<QueueEntry> {
        Ok(QueueEntry {
            kind,
            id: row.get("id")?,
            details: EntryDetails {
                name: row.get("name")?,
                title: row.get("title")?,
                artist: row.get("artist")?,
                album: row.get("album")?,
                album_id: row.get("album_id")?,
            },
            created_at: row.get("created_at")?,
            last_checked_at: row.get("last_checked_at")?,
        })
    }

    /// Helper for the cross-kind query, which carries the kind as a column.
    fn row_to_tagged_entry(row: &rusqlite::Row) -> rusqlite::Result<QueueEntry> {
        let kind_str: String = row.get("kind")?;
        let kind = EntityKind::from_str(&kind_str)
            .ok_or_else(|| rusqlite::Error::InvalidColumnType(0, kind_str, Type::Text))?;
        Self::row_to_entry(kind, row)
    }

    fn list_kind_locked(conn: &Connection, kind: EntityKind) -> Result<Vec<QueueEntry>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM {} {}",
            select_columns(kind),
            kind.table_name(),
            DISPLAY_ORDER
        ))?;
        let entries = stmt
            .query_map([], |row| Self::row_to_entry(kind, row))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }

    fn get_entry_locked(
        conn: &Connection,
        kind: EntityKind,
        id: &str,
    ) -> Result<Option<QueueEntry>> {
        let entry = conn
            .query_row(
                &format!(
                    "SELECT {} FROM {} WHERE id = ?1",
                    select_columns(kind),
                    kind.table_name()
                ),
                [id],
                |row| Self::row_to_entry(kind, row),
            )
            .optional()?;
        Ok(entry)
    }
}

impl DownloadQueueStore for SqliteDownloadQueueStore {
    fn insert(&self, kind: EntityKind, id: &str, details: EntryDetails) -> Result<InsertOutcome> {
        let id = match validate_entry_id(id) {
            Ok(id) => id,
            Err(reason) => {
                debug!("Rejected {} id {:?}: {}", kind, id, reason);
                return Ok(InsertOutcome::Rejected(reason));
            }
        };
        let details = details.normalized();
        let created_at = chrono::Utc::now().timestamp();

        let conn = self.lock()?;
        let inserted = match kind {
            EntityKind::Artist => conn.execute(
                "INSERT OR IGNORE INTO artists (id, name, created_at) VALUES (?1, ?2, ?3)",
                params![id, details.name, created_at],
            )?,
            EntityKind::Album => conn.execute(
                "INSERT OR IGNORE INTO albums (id, title, artist, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![id, details.title, details.artist, created_at],
            )?,
            EntityKind::Track => conn.execute(
                r#"INSERT OR IGNORE INTO tracks (id, title, artist, album, album_id, created_at)
                   VALUES (?1, ?2, ?3, ?4, ?5, ?6)"#,
                params![
                    id,
                    details.title,
                    details.artist,
                    details.album,
                    details.album_id,
                    created_at
                ],
            )?,
        };

        if inserted == 0 {
            return Ok(InsertOutcome::AlreadyExisted);
        }
        let entry = Self::get_entry_locked(&conn, kind, &id)?
            .ok_or_else(|| anyhow!("{} {} missing right after insert", kind, id))?;
        Ok(InsertOutcome::Created(entry))
    }

    fn remove_by_id(&self, kind: EntityKind, id: &str) -> Result<RemoveOutcome> {
        let id = id.trim();
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let Some(entry) = Self::get_entry_locked(&tx, kind, id)? else {
            return Ok(RemoveOutcome::NotFound);
        };
        tx.execute(
            &format!("DELETE FROM {} WHERE id = ?1", kind.table_name()),
            [id],
        )?;
        tx.commit()?;
        Ok(RemoveOutcome::Removed(entry))
    }

    fn remove_by_index(
        &self,
        kind: EntityKind,
        index: usize,
        expected_id: Option<&str>,
    ) -> Result<RemoveOutcome> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let entry = tx
            .query_row(
                &format!(
                    "SELECT {} FROM {} {} LIMIT 1 OFFSET ?1",
                    select_columns(kind),
                    kind.table_name(),
                    DISPLAY_ORDER
                ),
                [index as i64],
                |row| Self::row_to_entry(kind, row),
            )
            .optional()?;

        let Some(entry) = entry else {
            return Ok(RemoveOutcome::NotFound);
        };
        if let Some(expected) = expected_id {
            if expected.trim() != entry.id {
                debug!(
                    "Refusing to remove {} at index {}: expected id {:?}, found {:?}",
                    kind, index, expected, entry.id
                );
                return Ok(RemoveOutcome::NotFound);
            }
        }

        tx.execute(
            &format!("DELETE FROM {} WHERE id = ?1", kind.table_name()),
            [&entry.id],
        )?;
        tx.commit()?;
        Ok(RemoveOutcome::Removed(entry))
    }

    fn mark_checked_at(&self, kind: EntityKind, id: &str, checked_at: i64) -> Result<bool> {
        let conn = self.lock()?;
        let updated = conn.execute(
            &format!(
                "UPDATE {} SET last_checked_at = MAX(COALESCE(last_checked_at, 0), ?1) WHERE id = ?2",
                kind.table_name()
            ),
            params![checked_at, id],
        )?;
        Ok(updated > 0)
    }

    fn get_entry(&self, kind: EntityKind, id: &str) -> Result<Option<QueueEntry>> {
        let conn = self.lock()?;
        Self::get_entry_locked(&conn, kind, id)
    }

    fn list_kind(&self, kind: EntityKind) -> Result<Vec<QueueEntry>> {
        let conn = self.lock()?;
        Self::list_kind_locked(&conn, kind)
    }

    fn list_all(&self) -> Result<QueueSnapshot> {
        let conn = self.lock()?;
        let mut snapshot = QueueSnapshot::default();
        for kind in EntityKind::ALL {
            *snapshot.get_mut(kind) = Self::list_kind_locked(&conn, kind)?;
        }
        Ok(snapshot)
    }

    fn next_ready(&self) -> Result<Option<QueueEntry>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare_cached(NEXT_READY_QUERY)?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let entry = Self::row_to_tagged_entry(row)?;
            // Legacy rows never went through insert validation.
            match validate_entry_id(&entry.id) {
                Ok(_) => return Ok(Some(entry)),
                Err(reason) => debug!("Skipping {} {:?}: {}", entry.kind, entry.id, reason),
            }
        }
        Ok(None)
    }

    fn counts(&self) -> Result<QueueCounts> {
        let conn = self.lock()?;
        let mut counts = QueueCounts::default();
        for kind in EntityKind::ALL {
            let (total, never_checked): (i64, i64) = conn.query_row(
                &format!(
                    "SELECT COUNT(*), COUNT(*) - COUNT(last_checked_at) FROM {}",
                    kind.table_name()
                ),
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?;
            match kind {
                EntityKind::Artist => counts.artist = total as usize,
                EntityKind::Album => counts.album = total as usize,
                EntityKind::Track => counts.track = total as usize,
            }
            counts.never_checked += never_checked as usize;
        }
        Ok(counts)
    }
}
