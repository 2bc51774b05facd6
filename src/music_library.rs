//! Cleanup of downloaded music when an artist leaves the queue.

use std::path::{Component, Path, PathBuf};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtistDirRemoval {
    Deleted(PathBuf),
    Missing,
    /// Name was empty or resolved outside the music directory.
    Refused,
}

/// Deletes `<music_dir>/<artist_name>`.
///
/// Never touches anything outside `music_dir`, nor `music_dir` itself.
pub fn delete_artist_directory(music_dir: &Path, artist_name: &str) -> ArtistDirRemoval {
    let artist_name = artist_name.trim();
    if artist_name.is_empty() {
        return ArtistDirRemoval::Refused;
    }

    let relative = Path::new(artist_name);
    let only_normal_components = relative
        .components()
        .all(|c| matches!(c, Component::Normal(_)));
    if !only_normal_components || relative.components().count() != 1 {
        warn!(
            "Refusing to delete artist directory outside music base: {:?}",
            artist_name
        );
        return ArtistDirRemoval::Refused;
    }

    let target = music_dir.join(relative);
    if let (Ok(base), Ok(resolved)) = (music_dir.canonicalize(), target.canonicalize()) {
        if resolved == base || !resolved.starts_with(&base) {
            warn!(
                "Refusing to delete {:?}, it resolves outside the music base",
                target
            );
            return ArtistDirRemoval::Refused;
        }
    }

    let result = match std::fs::symlink_metadata(&target) {
        Ok(meta) if meta.is_dir() => std::fs::remove_dir_all(&target),
        Ok(_) => std::fs::remove_file(&target),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(
                "Music directory for artist {:?} not found at {:?}",
                artist_name, target
            );
            return ArtistDirRemoval::Missing;
        }
        Err(e) => Err(e),
    };

    match result {
        Ok(()) => {
            info!(
                "Deleted music directory for artist {:?} at {:?}",
                artist_name, target
            );
            ArtistDirRemoval::Deleted(target)
        }
        Err(e) => {
            warn!(
                "Failed to delete music directory for artist {:?} at {:?}: {}",
                artist_name, target, e
            );
            ArtistDirRemoval::Missing
        }
    }
}
