//! Single-snapshot JSON cache over a library folder.
//!
//! One snapshot file, replaced unconditionally on every fresh scan. A cached
//! snapshot is served back verbatim when it matches the requested folder and
//! is non-empty — that fast path is what every normal `loadFolder` takes.

use std::path::{Path, PathBuf};

use crate::library::model::LibrarySnapshot;
use crate::library::scanner::{self, ScanError};

pub struct LibraryCache {
    path: PathBuf,
}

impl LibraryCache {
    pub fn new(path: PathBuf) -> Self {
        LibraryCache { path }
    }

    /// Load `folder`, from the cache when `use_cache` allows it, otherwise by
    /// a full rescan followed by a replace-on-write persist.
    pub fn load(&self, folder: &Path, use_cache: bool) -> Result<LibrarySnapshot, ScanError> {
        if use_cache {
            if let Some(snapshot) = self.cached_for(folder) {
                tracing::debug!(
                    "Cache hit for {} ({} tracks)",
                    folder.display(),
                    snapshot.tracks.len()
                );
                return Ok(snapshot);
            }
        }
        let snapshot = scanner::scan_folder(folder)?;
        self.persist(&snapshot);
        Ok(snapshot)
    }

    /// Return the persisted snapshot iff it belongs to `folder` and has
    /// tracks. A missing or corrupt cache file is a miss, never an error.
    fn cached_for(&self, folder: &Path) -> Option<LibrarySnapshot> {
        let text = std::fs::read_to_string(&self.path).ok()?;
        let snapshot: LibrarySnapshot = match serde_json::from_str(&text) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!("Ignoring corrupt cache file {}: {}", self.path.display(), e);
                return None;
            }
        };
        let matches = snapshot.folder == folder.display().to_string();
        (matches && !snapshot.tracks.is_empty()).then_some(snapshot)
    }

    /// Persist `snapshot`, replacing whatever was cached before. Failure is
    /// logged and swallowed — a dead cache degrades to rescans, nothing more.
    pub fn persist(&self, snapshot: &LibrarySnapshot) {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                if let Err(e) = std::fs::create_dir_all(parent) {
                    tracing::warn!("Cannot create cache directory {}: {}", parent.display(), e);
                    return;
                }
            }
        }
        let json = match serde_json::to_string(snapshot) {
            Ok(j) => j,
            Err(e) => {
                tracing::warn!("Cannot serialize library snapshot: {}", e);
                return;
            }
        };
        if let Err(e) = std::fs::write(&self.path, json) {
            tracing::warn!("Cannot write cache file {}: {}", self.path.display(), e);
        }
    }
}
