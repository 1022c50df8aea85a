//! Storage abstraction for persisted UI state.
//!
//! A single trait `StorageBackend` with string-level APIs, plus the free
//! `save_json_backend`/`load_json_backend` helpers that use `serde` for
//! structured data. `FileStorage` keeps a JSON file holding a map of string keys
//! to string values, read once on open and flushed synchronously on every write.

use serde::{Serialize, de::DeserializeOwned};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("JSON error: {0}")]
    Json(String),

    #[error("Platform storage error: {0}")]
    Platform(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Simple generic storage backend trait.
///
/// Keys and values are UTF-8 strings.
pub trait StorageBackend: Send + Sync {
    /// Store a string value for a key.
    fn set_string(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Read a string value for a key. Returns Ok(None) when key is missing.
    fn get_string(&self, key: &str) -> StorageResult<Option<String>>;

    /// Remove a key (no-op if key does not exist).
    fn remove(&self, key: &str) -> StorageResult<()>;
}

pub fn save_json_backend<T: Serialize>(
    backend: &dyn StorageBackend,
    key: &str,
    value: &T,
) -> StorageResult<()> {
    match serde_json::to_string(value) {
        Ok(s) => backend.set_string(key, &s),
        Err(e) => Err(StorageError::Json(e.to_string())),
    }
}

pub fn load_json_backend<T: DeserializeOwned>(
    backend: &dyn StorageBackend,
    key: &str,
) -> StorageResult<Option<T>> {
    match backend.get_string(key)? {
        Some(s) => match serde_json::from_str::<T>(&s) {
            Ok(v) => Ok(Some(v)),
            Err(e) => Err(StorageError::Json(e.to_string())),
        },
        None => Ok(None),
    }
}

/// File-based storage: a single JSON file which is a map of key -> string value.
pub struct FileStorage {
    path: PathBuf,
    inner: Mutex<HashMap<String, String>>,
}

impl FileStorage {
    /// Per-user default location:
    /// - On Windows: %APPDATA%/Trailmap/storage.json
    /// - Else: $HOME/.config/trailmap/storage.json
    fn default_storage_path() -> PathBuf {
        if cfg!(windows)
            && let Ok(appdata) = std::env::var("APPDATA")
        {
            return Path::new(&appdata).join("Trailmap").join("storage.json");
        }

        if let Ok(home) = std::env::var("HOME") {
            return Path::new(&home)
                .join(".config")
                .join("trailmap")
                .join("storage.json");
        }

        Path::new(".").join("trailmap-storage.json")
    }

    /// Open (or create) the storage file at `path`, or at the default location
    pub fn new_with_path(path: Option<PathBuf>) -> StorageResult<Self> {
        let path = path.unwrap_or_else(Self::default_storage_path);

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && let Err(e) = fs::create_dir_all(parent)
        {
            return Err(StorageError::Io(format!(
                "Failed to create storage parent directory: {}",
                e
            )));
        }

        let mut map: HashMap<String, String> = HashMap::new();
        if path.exists() {
            let s = fs::read_to_string(&path)
                .map_err(|e| StorageError::Io(format!("Failed to read storage file: {}", e)))?;
            if !s.trim().is_empty() {
                map = serde_json::from_str(&s).map_err(|e| {
                    StorageError::Json(format!("Failed to parse storage JSON: {}", e))
                })?;
            }
        }

        tracing::debug!(path = %path.display(), keys = map.len(), "Opened storage");
        Ok(FileStorage {
            path,
            inner: Mutex::new(map),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush_locked(&self, locked: &HashMap<String, String>) -> StorageResult<()> {
        let s = serde_json::to_string_pretty(locked).map_err(|e| StorageError::Json(e.to_string()))?;
        fs::write(&self.path, s).map_err(|e| StorageError::Io(format!("write failed: {}", e)))
    }

    fn lock(&self) -> StorageResult<std::sync::MutexGuard<'_, HashMap<String, String>>> {
        self.inner
            .lock()
            .map_err(|e| StorageError::Platform(format!("mutex poisoned: {:?}", e)))
    }
}

impl StorageBackend for FileStorage {
    fn set_string(&self, key: &str, value: &str) -> StorageResult<()> {
        let mut guard = self.lock()?;
        guard.insert(key.to_string(), value.to_string());
        self.flush_locked(&guard)
    }

    fn get_string(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        let mut guard = self.lock()?;
        if guard.remove(key).is_some() {
            self.flush_locked(&guard)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Sample {
        name: String,
        count: u32,
    }

    #[test]
    fn test_file_storage_roundtrip_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("storage.json");

        let storage = FileStorage::new_with_path(Some(path.clone())).unwrap();
        let value = Sample {
            name: "contours".to_string(),
            count: 3,
        };
        save_json_backend(&storage, "sample", &value).unwrap();
        assert_eq!(storage.path(), path.as_path());

        let reopened = FileStorage::new_with_path(Some(path)).unwrap();
        let loaded: Option<Sample> = load_json_backend(&reopened, "sample").unwrap();
        assert_eq!(loaded, Some(value));
    }

    #[test]
    fn test_missing_key_and_remove() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new_with_path(Some(dir.path().join("s.json"))).unwrap();

        assert_eq!(storage.get_string("absent").unwrap(), None);
        storage.set_string("k", "v").unwrap();
        storage.remove("k").unwrap();
        storage.remove("k").unwrap();
        assert_eq!(storage.get_string("k").unwrap(), None);
    }

    #[test]
    fn test_corrupt_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.json");
        fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            FileStorage::new_with_path(Some(path)),
            Err(StorageError::Json(_))
        ));
    }

    #[test]
    fn test_wrong_shape_is_json_error() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new_with_path(Some(dir.path().join("s.json"))).unwrap();
        storage.set_string("sample", "[1, 2]").unwrap();
        assert!(matches!(
            load_json_backend::<Sample>(&storage, "sample"),
            Err(StorageError::Json(_))
        ));
    }
}
