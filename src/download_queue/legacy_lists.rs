//! One-time import of the flat list files that predate the database.
//!
//! Older deployments kept the queue as `artists.csv` (`id,name` rows, or a
//! bare-id `artists.txt` before that), `albums.txt` and `tracks.txt` in the
//! lists directory. Each file found is imported into the store and then
//! renamed with an `.imported` suffix so the import never runs twice.

use super::models::{validate_entry_id, EntityKind, EntryDetails, InsertOutcome};
use super::queue_store::DownloadQueueStore;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const IMPORTED_SUFFIX: &str = "imported";

/// Tally of a legacy import run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LegacyImport {
    pub files: usize,
    pub imported: usize,
    pub duplicates: usize,
    pub skipped: usize,
}

/// Imports every legacy list file present in `dir`. A missing directory or
/// missing files are not an error.
pub fn import_legacy_lists(store: &dyn DownloadQueueStore, dir: &Path) -> Result<LegacyImport> {
    let mut tally = LegacyImport::default();

    let csv_path = dir.join("artists.csv");
    let txt_path = dir.join("artists.txt");
    if csv_path.is_file() {
        let rows = read_lines(&csv_path)?
            .iter()
            .filter_map(|line| artist_from_csv_row(line))
            .collect();
        import_file(store, EntityKind::Artist, &csv_path, rows, &mut tally)?;
    } else if txt_path.is_file() {
        let rows = read_lines(&txt_path)?
            .into_iter()
            .map(|line| {
                let id = line.trim().to_string();
                let details = EntryDetails::artist(id.clone());
                (id, details)
            })
            .collect();
        import_file(store, EntityKind::Artist, &txt_path, rows, &mut tally)?;
    }

    for (kind, name) in [(EntityKind::Album, "albums.txt"), (EntityKind::Track, "tracks.txt")] {
        let path = dir.join(name);
        if !path.is_file() {
            continue;
        }
        let rows = read_lines(&path)?
            .into_iter()
            .map(|line| (line.trim().to_string(), EntryDetails::default()))
            .collect();
        import_file(store, kind, &path, rows, &mut tally)?;
    }

    if tally.files > 0 {
        info!(
            "Imported {} legacy list entries from {} file(s) ({} already queued, {} skipped)",
            tally.imported, tally.files, tally.duplicates, tally.skipped
        );
    }
    Ok(tally)
}

fn import_file(
    store: &dyn DownloadQueueStore,
    kind: EntityKind,
    path: &Path,
    rows: Vec<(String, EntryDetails)>,
    tally: &mut LegacyImport,
) -> Result<()> {
    for (id, details) in rows {
        if id.is_empty() {
            continue;
        }
        if let Err(reason) = validate_entry_id(&id) {
            debug!("Skipping legacy {} line {:?}: {}", kind, id, reason);
            tally.skipped += 1;
            continue;
        }
        match store.insert(kind, &id, details)? {
            InsertOutcome::Created(_) => tally.imported += 1,
            InsertOutcome::AlreadyExisted => tally.duplicates += 1,
            InsertOutcome::Rejected(_) => tally.skipped += 1,
        }
    }
    tally.files += 1;

    let done = imported_path(path);
    if let Err(e) = std::fs::rename(path, &done) {
        warn!("Failed to rename imported list {:?} to {:?}: {}", path, done, e);
    }
    Ok(())
}

fn imported_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".");
    name.push(IMPORTED_SUFFIX);
    path.with_file_name(name)
}

fn read_lines(path: &Path) -> Result<Vec<String>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read legacy list {:?}", path))?;
    Ok(text
        .trim_start_matches('\u{feff}')
        .lines()
        .map(str::to_string)
        .collect())
}

/// `id,name` with the name falling back to the id, as the old writer did.
fn artist_from_csv_row(line: &str) -> Option<(String, EntryDetails)> {
    let fields = split_csv_row(line);
    let id = fields.first()?.trim().to_string();
    if id.is_empty() {
        return None;
    }
    let name = fields
        .get(1)
        .map(|n| n.trim())
        .filter(|n| !n.is_empty())
        .unwrap_or(id.as_str())
        .to_string();
    Some((id, EntryDetails::artist(name)))
}

/// Splits one CSV record, honouring double-quoted fields with `""` escapes.
fn split_csv_row(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut quoted = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if quoted => {
                if chars.peek() == Some(&'"') {
                    field.push('"');
                    chars.next();
                } else {
                    quoted = false;
                }
            }
            '"' if field.is_empty() => quoted = true,
            ',' if !quoted => fields.push(std::mem::take(&mut field)),
            _ => field.push(c),
        }
    }
    fields.push(field);
    fields
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download_queue::SqliteDownloadQueueStore;
    use tempfile::TempDir;

    #[test]
    fn test_split_csv_row() {
        assert_eq!(split_csv_row("1,Daft Punk"), vec!["1", "Daft Punk"]);
        assert_eq!(
            split_csv_row(r#"2,"Earth, Wind & Fire""#),
            vec!["2", "Earth, Wind & Fire"]
        );
        assert_eq!(
            split_csv_row(r#"3,"The ""Best"" Band""#),
            vec!["3", r#"The "Best" Band"#]
        );
        assert_eq!(split_csv_row("4"), vec!["4"]);
    }

    #[test]
    fn test_imports_all_lists_once() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("artists.csv"),
            "123,Test Artist\n\"9\",\"Earth, Wind & Fire\"\n77,\n\n#5,Commented\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("albums.txt"), "456\n  \n../etc\n456\n").unwrap();
        std::fs::write(dir.path().join("tracks.txt"), "  88 \n").unwrap();
        let store = SqliteDownloadQueueStore::in_memory().unwrap();

        let tally = import_legacy_lists(&store, dir.path()).unwrap();

        assert_eq!(
            tally,
            LegacyImport {
                files: 3,
                imported: 5,
                duplicates: 1,
                skipped: 2,
            }
        );
        let artists = store.list_kind(EntityKind::Artist).unwrap();
        let names: Vec<_> = artists
            .iter()
            .map(|a| (a.id.as_str(), a.details.name.as_deref()))
            .collect();
        assert_eq!(
            names,
            vec![
                ("123", Some("Test Artist")),
                ("9", Some("Earth, Wind & Fire")),
                ("77", Some("77")),
            ]
        );
        assert!(store.get_entry(EntityKind::Album, "456").unwrap().is_some());
        assert!(store.get_entry(EntityKind::Track, "88").unwrap().is_some());

        assert!(!dir.path().join("artists.csv").exists());
        assert!(dir.path().join("artists.csv.imported").exists());
        assert!(dir.path().join("albums.txt.imported").exists());

        // A second start finds nothing left to import.
        store.remove_by_id(EntityKind::Artist, "123").unwrap();
        let again = import_legacy_lists(&store, dir.path()).unwrap();
        assert_eq!(again, LegacyImport::default());
        assert!(store.get_entry(EntityKind::Artist, "123").unwrap().is_none());
    }

    #[test]
    fn test_bare_artist_ids_use_id_as_name() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("artists.txt"), "123\n456\n").unwrap();
        let store = SqliteDownloadQueueStore::in_memory().unwrap();

        let tally = import_legacy_lists(&store, dir.path()).unwrap();

        assert_eq!(tally.imported, 2);
        let artist = store.get_entry(EntityKind::Artist, "456").unwrap().unwrap();
        assert_eq!(artist.details.name.as_deref(), Some("456"));
        assert!(dir.path().join("artists.txt.imported").exists());
    }

    #[test]
    fn test_csv_wins_over_bare_artist_list() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("artists.csv"), "1,One\n").unwrap();
        std::fs::write(dir.path().join("artists.txt"), "2\n").unwrap();
        let store = SqliteDownloadQueueStore::in_memory().unwrap();

        import_legacy_lists(&store, dir.path()).unwrap();

        assert_eq!(store.list_kind(EntityKind::Artist).unwrap().len(), 1);
        assert!(dir.path().join("artists.txt").exists());
    }

    #[test]
    fn test_missing_directory_is_empty_import() {
        let dir = TempDir::new().unwrap();
        let store = SqliteDownloadQueueStore::in_memory().unwrap();

        let tally = import_legacy_lists(&store, &dir.path().join("absent")).unwrap();

        assert_eq!(tally, LegacyImport::default());
        assert_eq!(store.counts().unwrap().total(), 0);
    }
}
