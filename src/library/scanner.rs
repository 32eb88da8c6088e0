use std::fs::DirEntry;
use std::path::Path;
use std::time::Instant;

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::library::model::{LibrarySnapshot, Track};
use crate::library::tags;

#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("failed to read folder {folder}: {source}")]
    Folder {
        folder: String,
        #[source]
        source: std::io::Error,
    },
}

/// Sanitize a filename for use as a track identity and URL path segment:
/// Unicode NFD normalization with combining marks stripped. Nothing else.
pub fn sanitize_filename(name: &str) -> String {
    name.nfd().filter(|c| !is_combining_mark(*c)).collect()
}

/// Scan one folder (non-recursive) into a fresh snapshot.
///
/// An unreadable folder is fatal for this scan only. Individual entries that
/// fail to stat or whose tag read fails are logged and skipped — the batch
/// continues. Tracks come back sorted case-insensitively by filename.
pub fn scan_folder(folder: &Path) -> Result<LibrarySnapshot, ScanError> {
    let start = Instant::now();
    let entries = std::fs::read_dir(folder).map_err(|source| ScanError::Folder {
        folder: folder.display().to_string(),
        source,
    })?;

    let mut tracks: Vec<Track> = Vec::new();
    for entry in entries {
        match entry {
            Ok(entry) => process_entry(&entry, &mut tracks),
            Err(e) => tracing::warn!("Cannot access entry in {}: {}", folder.display(), e),
        }
    }

    tracks.sort_by_key(|t| t.filename.to_lowercase());
    let snapshot = LibrarySnapshot::from_tracks(folder.display().to_string(), tracks);
    tracing::info!(
        "Scanned {} tracks in {} ({:.1}s)",
        snapshot.tracks.len(),
        folder.display(),
        start.elapsed().as_secs_f64()
    );
    Ok(snapshot)
}

fn process_entry(entry: &DirEntry, tracks: &mut Vec<Track>) {
    let path = entry.path();
    let is_mp3 = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("mp3"));
    if !is_mp3 {
        return;
    }

    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        tracing::warn!("Skipping non-UTF-8 filename: {}", path.display());
        return;
    };

    // stat the resolved path so symlinked tracks count as files
    match std::fs::metadata(&path) {
        Ok(m) if m.is_file() => {}
        Ok(_) => {
            tracing::warn!("Skipping non-file entry {}", path.display());
            return;
        }
        Err(e) => {
            tracing::warn!("Cannot stat {}: {}", path.display(), e);
            return;
        }
    }

    let filename = sanitize_filename(name);
    if tracks.iter().any(|t| t.filename == filename) {
        tracing::warn!(
            "Duplicate sanitized filename {:?}, skipping {}",
            filename,
            path.display()
        );
        return;
    }

    let (rating, genres) = match tags::read_track_tags(&path) {
        Ok(read) => read,
        Err(e) => {
            tracing::warn!("Cannot read tags for {}: {}", path.display(), e);
            return;
        }
    };

    let url_path = format!("/music/{}", urlencoding::encode(&filename));
    tracks.push(Track {
        filename,
        original_name: name.to_string(),
        path: url_path,
        rating,
        genres,
    });
}
