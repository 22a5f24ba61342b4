//! Durable preference storage
//!
//! The engine persists exactly three preferences (shuffle, repeat mode,
//! volume) as strings, read once at startup and written through on every
//! change. Writes are best-effort: a failed write loses the preference, not
//! playback, so implementations log and move on.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::warn;

use crate::error::Result;

/// String key/value storage for persisted preferences
pub trait SettingsStore: Send + Sync {
    /// Read a stored value
    fn get(&self, key: &str) -> Option<String>;

    /// Store a value, overwriting any previous one
    fn set(&self, key: &str, value: &str);
}

/// In-memory store for tests and ephemeral sessions
#[derive(Debug, Default)]
pub struct MemorySettings {
    values: Mutex<HashMap<String, String>>,
}

impl MemorySettings {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

impl SettingsStore for MemorySettings {
    fn get(&self, key: &str) -> Option<String> {
        self.values.lock().unwrap().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.values
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
    }
}

/// Write-through store backed by a single JSON file
///
/// The whole map is held in memory and rewritten on every `set`. Fine for a
/// handful of preference keys; not a database.
#[derive(Debug)]
pub struct JsonFileSettings {
    path: PathBuf,
    values: Mutex<HashMap<String, String>>,
}

impl JsonFileSettings {
    /// Open (or create) the settings file at `path`
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let values = match fs::read_to_string(&path) {
            Ok(contents) => serde_json::from_str(&contents)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(err) => return Err(err.into()),
        };

        Ok(Self {
            path,
            values: Mutex::new(values),
        })
    }

    fn flush(&self, values: &HashMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(values)?;
        fs::write(&self.path, contents)?;
        Ok(())
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SettingsStore for JsonFileSettings {
    fn get(&self, key: &str) -> Option<String> {
        self.values.lock().unwrap().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        let mut values = self.values.lock().unwrap();
        values.insert(key.to_string(), value.to_string());

        if let Err(err) = self.flush(&values) {
            warn!(path = %self.path.display(), %err, "failed to persist settings");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_round_trips() {
        let store = MemorySettings::new();
        assert_eq!(store.get("player-volume"), None);

        store.set("player-volume", "85");
        assert_eq!(store.get("player-volume").as_deref(), Some("85"));

        store.set("player-volume", "40");
        assert_eq!(store.get("player-volume").as_deref(), Some("40"));
    }

    #[test]
    fn json_store_persists_across_reopens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("player.json");

        {
            let store = JsonFileSettings::open(&path).unwrap();
            store.set("player-shuffle", "true");
            store.set("player-repeat", "all");
        }

        let store = JsonFileSettings::open(&path).unwrap();
        assert_eq!(store.get("player-shuffle").as_deref(), Some("true"));
        assert_eq!(store.get("player-repeat").as_deref(), Some("all"));
        assert_eq!(store.get("player-volume"), None);
    }

    #[test]
    fn json_store_starts_empty_when_file_is_missing() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileSettings::open(dir.path().join("missing.json")).unwrap();
        assert_eq!(store.get("anything"), None);
    }

    #[test]
    fn json_store_rejects_corrupt_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("player.json");
        fs::write(&path, "not json").unwrap();

        assert!(JsonFileSettings::open(&path).is_err());
    }
}
