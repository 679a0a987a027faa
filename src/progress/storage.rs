// Keyed storage backends for the persisted progress record

use crate::errors::TetsundoError;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Trait defining the interface for the keyed record storage used by the
/// progress store. Values are opaque strings (serialized JSON).
pub trait ProgressStorage {
    /// Read the record stored under `key`, `Ok(None)` when there is none.
    fn read(&self, key: &str) -> Result<Option<String>, TetsundoError>;

    /// Overwrite the record stored under `key`.
    fn write(&mut self, key: &str, value: &str) -> Result<(), TetsundoError>;

    /// Delete the record stored under `key`. Removing a missing key is not an error.
    fn remove(&mut self, key: &str) -> Result<(), TetsundoError>;

    /// Previous version of the record, if the backend keeps one.
    fn read_backup(&self, _key: &str) -> Result<Option<String>, TetsundoError> {
        Ok(None)
    }
}

impl<T: ProgressStorage + ?Sized> ProgressStorage for Box<T> {
    fn read(&self, key: &str) -> Result<Option<String>, TetsundoError> {
        (**self).read(key)
    }

    fn write(&mut self, key: &str, value: &str) -> Result<(), TetsundoError> {
        (**self).write(key, value)
    }

    fn remove(&mut self, key: &str) -> Result<(), TetsundoError> {
        (**self).remove(key)
    }

    fn read_backup(&self, key: &str) -> Result<Option<String>, TetsundoError> {
        (**self).read_backup(key)
    }
}

/// In-memory storage. Nothing survives the process.
#[derive(Debug, Default, Clone)]
pub struct MemoryStorage {
    records: HashMap<String, String>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl ProgressStorage for MemoryStorage {
    fn read(&self, key: &str) -> Result<Option<String>, TetsundoError> {
        Ok(self.records.get(key).cloned())
    }

    fn write(&mut self, key: &str, value: &str) -> Result<(), TetsundoError> {
        self.records.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), TetsundoError> {
        self.records.remove(key);
        Ok(())
    }
}

/// File-based storage: one `<key>.json` file per record inside a directory.
///
/// Every write first copies the current file to `<key>.json.bak`, then writes
/// the new content to a temporary file and renames it into place.
pub struct FileStorage {
    /// Base directory holding the record files
    storage_path: PathBuf,
}

impl FileStorage {
    /// Create a new file-based storage instance, creating the directory if needed
    pub fn new(storage_path: PathBuf) -> Result<Self, TetsundoError> {
        if !storage_path.exists() {
            fs::create_dir_all(&storage_path).map_err(|e| TetsundoError::StorageUnavailable {
                operation: format!("create storage directory {:?}", storage_path),
                source: e,
            })?;
        }

        Ok(Self { storage_path })
    }

    /// Create storage in the default application data directory
    pub fn new_default() -> Result<Self, TetsundoError> {
        Self::new(Self::default_storage_path()?)
    }

    /// Default storage path, `<data_dir>/tetsundo`
    pub fn default_storage_path() -> Result<PathBuf, TetsundoError> {
        let app_data_dir = dirs::data_dir().ok_or(TetsundoError::NoDataDir)?;
        Ok(app_data_dir.join("tetsundo"))
    }

    pub fn storage_path(&self) -> &Path {
        &self.storage_path
    }

    /// Generate the file path for a given key
    pub fn file_path_for_key(&self, key: &str) -> PathBuf {
        self.storage_path
            .join(format!("{}.json", Self::normalize_key(key)))
    }

    fn backup_path_for_key(&self, key: &str) -> PathBuf {
        self.storage_path
            .join(format!("{}.json.bak", Self::normalize_key(key)))
    }

    fn temp_path_for_key(&self, key: &str) -> PathBuf {
        self.storage_path
            .join(format!("{}.json.tmp", Self::normalize_key(key)))
    }

    /// Normalize a key for consistent file naming
    fn normalize_key(key: &str) -> String {
        key.chars()
            .map(|c| {
                if c.is_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect()
    }

    fn read_path(path: &Path, operation: &str) -> Result<Option<String>, TetsundoError> {
        if !path.exists() {
            return Ok(None);
        }
        fs::read_to_string(path)
            .map(Some)
            .map_err(|e| TetsundoError::StorageUnavailable {
                operation: format!("{} {:?}", operation, path),
                source: e,
            })
    }
}

impl ProgressStorage for FileStorage {
    fn read(&self, key: &str) -> Result<Option<String>, TetsundoError> {
        Self::read_path(&self.file_path_for_key(key), "read")
    }

    fn write(&mut self, key: &str, value: &str) -> Result<(), TetsundoError> {
        let file_path = self.file_path_for_key(key);

        if file_path.exists() {
            let backup_path = self.backup_path_for_key(key);
            if let Err(e) = fs::copy(&file_path, &backup_path) {
                // a missing backup only weakens recovery, the write still goes ahead
                log::warn!("Failed to back up {:?}: {}", file_path, e);
            }
        }

        let temp_path = self.temp_path_for_key(key);
        fs::write(&temp_path, value).map_err(|e| TetsundoError::StorageUnavailable {
            operation: format!("write {:?}", temp_path),
            source: e,
        })?;
        fs::rename(&temp_path, &file_path).map_err(|e| TetsundoError::StorageUnavailable {
            operation: format!("rename {:?} to {:?}", temp_path, file_path),
            source: e,
        })?;

        log::debug!("Wrote record '{}' to {:?}", key, file_path);
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), TetsundoError> {
        for path in [self.file_path_for_key(key), self.backup_path_for_key(key)] {
            if path.exists() {
                fs::remove_file(&path).map_err(|e| TetsundoError::StorageUnavailable {
                    operation: format!("remove {:?}", path),
                    source: e,
                })?;
                log::debug!("Removed {:?}", path);
            }
        }
        Ok(())
    }

    fn read_backup(&self, key: &str) -> Result<Option<String>, TetsundoError> {
        Self::read_path(&self.backup_path_for_key(key), "read backup")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_file_storage_creation() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("store");
        let storage = FileStorage::new(path.clone()).unwrap();
        assert!(path.exists());
        assert_eq!(storage.storage_path(), path.as_path());
    }

    #[test]
    fn test_key_normalization() {
        assert_eq!(
            FileStorage::normalize_key("tetsundo_user_progress"),
            "tetsundo_user_progress"
        );
        assert_eq!(FileStorage::normalize_key("../escape/key"), "___escape_key");
    }

    #[test]
    fn test_write_read_remove() {
        let temp_dir = TempDir::new().unwrap();
        let mut storage = FileStorage::new(temp_dir.path().to_path_buf()).unwrap();

        assert_eq!(storage.read("k").unwrap(), None);
        storage.write("k", "{\"a\":1}").unwrap();
        assert_eq!(storage.read("k").unwrap().as_deref(), Some("{\"a\":1}"));

        storage.remove("k").unwrap();
        assert_eq!(storage.read("k").unwrap(), None);
        // removing twice is fine
        storage.remove("k").unwrap();
    }

    #[test]
    fn test_backup_keeps_previous_version() {
        let temp_dir = TempDir::new().unwrap();
        let mut storage = FileStorage::new(temp_dir.path().to_path_buf()).unwrap();

        storage.write("k", "first").unwrap();
        assert_eq!(storage.read_backup("k").unwrap(), None);

        storage.write("k", "second").unwrap();
        assert_eq!(storage.read("k").unwrap().as_deref(), Some("second"));
        assert_eq!(storage.read_backup("k").unwrap().as_deref(), Some("first"));

        storage.remove("k").unwrap();
        assert_eq!(storage.read_backup("k").unwrap(), None);
    }

    #[test]
    fn test_memory_storage() {
        let mut storage = MemoryStorage::new();
        assert!(storage.is_empty());
        storage.write("k", "v").unwrap();
        assert_eq!(storage.len(), 1);
        assert_eq!(storage.read("k").unwrap().as_deref(), Some("v"));
        assert_eq!(storage.read_backup("k").unwrap(), None);
        storage.remove("k").unwrap();
        assert!(storage.is_empty());
    }

    #[test]
    fn test_boxed_storage_delegates() {
        let mut storage: Box<dyn ProgressStorage> = Box::new(MemoryStorage::new());
        storage.write("k", "v").unwrap();
        assert_eq!(storage.read("k").unwrap().as_deref(), Some("v"));
    }
}
