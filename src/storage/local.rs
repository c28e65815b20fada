//! Synchronous local persistence
//!
//! The fallback backend for [`Storage`](super::Storage) and the home of the
//! locally persisted legacy token. Values are plain strings; structure is
//! layered on top by the caller.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use super::StorageError;

/// Synchronous string key-value store
pub trait LocalStore: Send + Sync {
    /// Returns the stored string, `None` if absent
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Stores `value` under `key`, replacing any previous value
    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Removes `key`; removing a missing key is not an error
    fn remove_item(&self, key: &str) -> Result<(), StorageError>;

    /// Removes every key
    fn clear(&self) -> Result<(), StorageError>;
}

/// Process-local store backed by a `HashMap`
#[derive(Debug, Default)]
pub struct MemoryLocalStore {
    items: RwLock<HashMap<String, String>>,
}

impl MemoryLocalStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.read().map(|items| items.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl LocalStore for MemoryLocalStore {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        let items = self.items.read().map_err(|_| StorageError::Poisoned)?;
        Ok(items.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut items = self.items.write().map_err(|_| StorageError::Poisoned)?;
        items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        let mut items = self.items.write().map_err(|_| StorageError::Poisoned)?;
        items.remove(key);
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        let mut items = self.items.write().map_err(|_| StorageError::Poisoned)?;
        items.clear();
        Ok(())
    }
}

/// Store persisted as a single JSON object file
///
/// The whole file is read on every access and rewritten on every mutation.
/// A missing file reads as an empty store. Writes go to a sibling temp file
/// that is renamed over the store, so an interrupted write leaves the old
/// contents intact. A file that no longer parses fails reads, but the next
/// write replaces it.
#[derive(Debug)]
pub struct FileLocalStore {
    path: PathBuf,
    lock: RwLock<()>,
}

impl FileLocalStore {
    /// Creates a store at `path`; the file is created on first write
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: RwLock::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<HashMap<String, String>, StorageError> {
        if !self.path.exists() {
            return Ok(HashMap::new());
        }
        let content = fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(HashMap::new());
        }
        Ok(serde_json::from_str(&content)?)
    }

    fn write_all(&self, items: &HashMap<String, String>) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }
        let content = serde_json::to_string_pretty(items)?;
        let staging = self.staging_path();
        fs::write(&staging, content)?;
        fs::rename(&staging, &self.path)?;
        Ok(())
    }

    fn staging_path(&self) -> PathBuf {
        let mut name = self.path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn mutate<F>(&self, f: F) -> Result<(), StorageError>
    where
        F: FnOnce(&mut HashMap<String, String>),
    {
        let _guard = self.lock.write().map_err(|_| StorageError::Poisoned)?;
        let mut items = match self.read_all() {
            Ok(items) => items,
            Err(StorageError::Serialization(e)) => {
                tracing::warn!("Discarding unreadable store {:?}: {}", self.path, e);
                HashMap::new()
            }
            Err(e) => return Err(e),
        };
        f(&mut items);
        self.write_all(&items)
    }
}

impl LocalStore for FileLocalStore {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        let _guard = self.lock.read().map_err(|_| StorageError::Poisoned)?;
        Ok(self.read_all()?.remove(key))
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.mutate(|items| {
            items.insert(key.to_string(), value.to_string());
        })
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        self.mutate(|items| {
            items.remove(key);
        })
    }

    fn clear(&self) -> Result<(), StorageError> {
        let _guard = self.lock.write().map_err(|_| StorageError::Poisoned)?;
        self.write_all(&HashMap::new())
    }
}
