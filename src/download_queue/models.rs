//! Data models for the download queue.
//!
//! Defines entity kinds, queue entries and the outcomes of queue mutations.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Kind of music entity a queue entry refers to.
///
/// Each kind lives in its own table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Artist,
    Album,
    Track,
}

impl EntityKind {
    pub const ALL: [EntityKind; 3] = [EntityKind::Artist, EntityKind::Album, EntityKind::Track];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Artist => "artist",
            EntityKind::Album => "album",
            EntityKind::Track => "track",
        }
    }

    pub fn table_name(&self) -> &'static str {
        match self {
            EntityKind::Artist => "artists",
            EntityKind::Album => "albums",
            EntityKind::Track => "tracks",
        }
    }

    /// Capitalized singular label used in user-facing messages.
    pub fn label(&self) -> &'static str {
        match self {
            EntityKind::Artist => "Artist",
            EntityKind::Album => "Album",
            EntityKind::Track => "Track",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "artist" => Some(EntityKind::Artist),
            "album" => Some(EntityKind::Album),
            "track" => Some(EntityKind::Track),
            _ => None,
        }
    }

    /// Lenient parsing for user input: case-insensitive, surrounding
    /// whitespace ignored, plural forms accepted ("Artists" -> artist).
    pub fn normalize(raw: &str) -> Option<Self> {
        let lowered = raw.trim().to_lowercase();
        let singular = lowered.strip_suffix('s').unwrap_or(&lowered);
        Self::from_str(singular)
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Denormalized display metadata. Which fields are meaningful depends on the
/// entry kind: `name` for artists, `title`+`artist` for albums, and
/// `title`+`artist`+`album`+`album_id` for tracks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub album: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub album_id: Option<String>,
}

impl EntryDetails {
    pub fn artist(name: impl Into<String>) -> Self {
        Self {
            name: non_blank(name.into()),
            ..Default::default()
        }
    }

    pub fn album(title: impl Into<String>, artist: impl Into<String>) -> Self {
        Self {
            title: non_blank(title.into()),
            artist: non_blank(artist.into()),
            ..Default::default()
        }
    }

    pub fn track(
        title: impl Into<String>,
        artist: impl Into<String>,
        album: impl Into<String>,
        album_id: impl Into<String>,
    ) -> Self {
        Self {
            title: non_blank(title.into()),
            artist: non_blank(artist.into()),
            album: non_blank(album.into()),
            album_id: non_blank(album_id.into()),
            ..Default::default()
        }
    }

    /// Trims every field and drops the ones left empty.
    pub fn normalized(self) -> Self {
        let clean = |value: Option<String>| value.and_then(non_blank);
        Self {
            name: clean(self.name),
            title: clean(self.title),
            artist: clean(self.artist),
            album: clean(self.album),
            album_id: clean(self.album_id),
        }
    }
}

fn non_blank(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// A persisted unit of queued work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueEntry {
    pub kind: EntityKind,
    pub id: String,
    #[serde(flatten)]
    pub details: EntryDetails,
    /// Unix timestamp (seconds), set once at insertion.
    pub created_at: i64,
    /// Unix timestamp (seconds) of the last completed attempt, `None` if never processed.
    pub last_checked_at: Option<i64>,
}

impl QueueEntry {
    /// Human readable label: artist name, "artist - title" for albums and
    /// tracks, falling back to the identifier.
    pub fn label(&self) -> String {
        let d = &self.details;
        match self.kind {
            EntityKind::Artist => d.name.clone().unwrap_or_else(|| self.id.clone()),
            EntityKind::Album | EntityKind::Track => match (&d.artist, &d.title) {
                (Some(artist), Some(title)) => format!("{} - {}", artist, title),
                (None, Some(title)) => title.clone(),
                _ => self.id.clone(),
            },
        }
    }

    pub fn last_checked_display(&self) -> String {
        format_last_checked(self.last_checked_at)
    }
}

/// Renders a `last_checked_at` value for display, "Never" when unset.
pub fn format_last_checked(last_checked_at: Option<i64>) -> String {
    match last_checked_at.and_then(|ts| chrono::DateTime::from_timestamp(ts, 0)) {
        Some(when) => when.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        None => "Never".to_string(),
    }
}

/// Reason an identifier cannot be queued.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidEntryId {
    #[error("Value cannot be empty.")]
    Empty,
    #[error("Entries starting with '#' are ignored by the scheduler.")]
    CommentPrefixed,
    #[error("Identifier contains path characters.")]
    PathCharacters,
}

/// Validates and trims an external-provider identifier.
///
/// Identifiers end up in file-system lookups (artwork cache), so path
/// separators, `..` and a leading dot are refused along with the empty and
/// `#`-prefixed values the scheduler never processes.
pub fn validate_entry_id(raw: &str) -> Result<String, InvalidEntryId> {
    let id = raw.trim();
    if id.is_empty() {
        return Err(InvalidEntryId::Empty);
    }
    if id.starts_with('#') {
        return Err(InvalidEntryId::CommentPrefixed);
    }
    if id.starts_with('.') || id.contains('/') || id.contains('\\') || id.contains("..") {
        return Err(InvalidEntryId::PathCharacters);
    }
    Ok(id.to_string())
}

/// Result of an insert-or-ignore.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The stored row, read back under the same lock as the insert.
    Created(QueueEntry),
    AlreadyExisted,
    Rejected(InvalidEntryId),
}

/// Result of a removal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoveOutcome {
    Removed(QueueEntry),
    NotFound,
}

/// Entries of every kind, each list in display order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QueueSnapshot {
    pub artist: Vec<QueueEntry>,
    pub album: Vec<QueueEntry>,
    pub track: Vec<QueueEntry>,
}

impl QueueSnapshot {
    pub fn get(&self, kind: EntityKind) -> &[QueueEntry] {
        match kind {
            EntityKind::Artist => &self.artist,
            EntityKind::Album => &self.album,
            EntityKind::Track => &self.track,
        }
    }

    pub fn get_mut(&mut self, kind: EntityKind) -> &mut Vec<QueueEntry> {
        match kind {
            EntityKind::Artist => &mut self.artist,
            EntityKind::Album => &mut self.album,
            EntityKind::Track => &mut self.track,
        }
    }

    pub fn total(&self) -> usize {
        self.artist.len() + self.album.len() + self.track.len()
    }
}

/// Number of entries per kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueCounts {
    pub artist: usize,
    pub album: usize,
    pub track: usize,
    /// Entries that were never processed, across all kinds.
    pub never_checked: usize,
}

impl QueueCounts {
    pub fn get(&self, kind: EntityKind) -> usize {
        match kind {
            EntityKind::Artist => self.artist,
            EntityKind::Album => self.album,
            EntityKind::Track => self.track,
        }
    }

    pub fn total(&self) -> usize {
        self.artist + self.album + self.track
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_kind() {
        assert_eq!(EntityKind::normalize("artist"), Some(EntityKind::Artist));
        assert_eq!(EntityKind::normalize("Albums"), Some(EntityKind::Album));
        assert_eq!(EntityKind::normalize("  TRACKS "), Some(EntityKind::Track));
        assert_eq!(EntityKind::normalize("playlist"), None);
        assert_eq!(EntityKind::normalize(""), None);
    }

    #[test]
    fn test_validate_entry_id() {
        assert_eq!(validate_entry_id("  123 "), Ok("123".to_string()));
        assert_eq!(validate_entry_id(""), Err(InvalidEntryId::Empty));
        assert_eq!(validate_entry_id("   "), Err(InvalidEntryId::Empty));
        assert_eq!(
            validate_entry_id("#123"),
            Err(InvalidEntryId::CommentPrefixed)
        );
        assert_eq!(
            validate_entry_id("../etc"),
            Err(InvalidEntryId::PathCharacters)
        );
        assert_eq!(
            validate_entry_id("a/b"),
            Err(InvalidEntryId::PathCharacters)
        );
        assert_eq!(
            validate_entry_id("a\\b"),
            Err(InvalidEntryId::PathCharacters)
        );
        assert_eq!(
            validate_entry_id(".hidden"),
            Err(InvalidEntryId::PathCharacters)
        );
    }

    #[test]
    fn test_entry_label() {
        let mut entry = QueueEntry {
            kind: EntityKind::Album,
            id: "456".to_string(),
            details: EntryDetails::album("Hello", "World"),
            created_at: 0,
            last_checked_at: None,
        };
        assert_eq!(entry.label(), "World - Hello");

        entry.details = EntryDetails::default();
        assert_eq!(entry.label(), "456");

        entry.kind = EntityKind::Artist;
        entry.details = EntryDetails::artist("Owl City");
        assert_eq!(entry.label(), "Owl City");
    }

    #[test]
    fn test_format_last_checked() {
        assert_eq!(format_last_checked(None), "Never");
        assert_eq!(format_last_checked(Some(0)), "1970-01-01 00:00:00 UTC");
    }

    #[test]
    fn test_details_normalized_drops_blank_fields() {
        let details = EntryDetails {
            name: Some("  ".to_string()),
            title: Some(" Title ".to_string()),
            ..Default::default()
        }
        .normalized();

        assert_eq!(details.name, None);
        assert_eq!(details.title, Some("Title".to_string()));
    }

    #[test]
    fn test_entry_serializes_flat() {
        let entry = QueueEntry {
            kind: EntityKind::Artist,
            id: "123".to_string(),
            details: EntryDetails::artist("Test Artist"),
            created_at: 10,
            last_checked_at: None,
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["kind"], "artist");
        assert_eq!(json["name"], "Test Artist");
        assert!(json["last_checked_at"].is_null());
        assert!(json.get("title").is_none());
    }
}
