//! Persisted session preferences: the last loaded folder and the bulk-copy
//! destination. One JSON file, merge-on-write — setting one key never
//! clobbers other keys, including keys this version does not know about.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Prefs {
    pub last_folder: Option<String>,
    pub destination_path: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum PrefsError {
    #[error("failed to write prefs file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to serialize prefs: {0}")]
    Serialize(#[from] serde_json::Error),
}

pub struct PrefsStore {
    path: PathBuf,
}

impl PrefsStore {
    pub fn new(path: PathBuf) -> Self {
        PrefsStore { path }
    }

    /// Load the known preference keys. Missing file is just empty prefs;
    /// a corrupt file is logged and treated the same.
    pub fn load(&self) -> Prefs {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(t) => t,
            Err(_) => return Prefs::default(),
        };
        match serde_json::from_str(&text) {
            Ok(prefs) => prefs,
            Err(e) => {
                tracing::warn!("Ignoring corrupt prefs file {}: {}", self.path.display(), e);
                Prefs::default()
            }
        }
    }

    pub fn set_last_folder(&self, folder: &str) -> Result<(), PrefsError> {
        self.merge_write("lastFolder", folder)
    }

    pub fn set_destination_path(&self, folder: &str) -> Result<(), PrefsError> {
        self.merge_write("destinationPath", folder)
    }

    /// Read the existing file as a raw JSON map, set one key, write it back.
    /// Unknown keys pass through untouched; an unreadable existing file
    /// starts from an empty map.
    fn merge_write(&self, key: &str, value: &str) -> Result<(), PrefsError> {
        let mut map: Map<String, Value> = std::fs::read_to_string(&self.path)
            .ok()
            .and_then(|text| serde_json::from_str(&text).ok())
            .unwrap_or_default();
        map.insert(key.to_string(), Value::String(value.to_string()));
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(&map)?)?;
        Ok(())
    }
}
