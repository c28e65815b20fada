//! Local store backed by the OS credential manager
//!
//! Persists values (the legacy token in particular) in Windows Credential
//! Manager, macOS Keychain or the Linux Secret Service via the keyring crate.

use std::collections::BTreeSet;
use std::sync::Mutex;

use keyring::Entry;

use super::{LocalStore, StorageError};

impl From<keyring::Error> for StorageError {
    fn from(e: keyring::Error) -> Self {
        StorageError::Local(e.to_string())
    }
}

/// Keyring-backed [`LocalStore`]
///
/// The credential manager cannot enumerate entries by service, so `clear`
/// removes the keys written through this instance plus the configured
/// well-known keys.
///
/// # Example
///
/// ```no_run
/// use studio_access::storage::{KeyringStore, LocalStore};
///
/// let store = KeyringStore::new();
/// store.set_item("token", "legacy-token").unwrap();
/// assert_eq!(store.get_item("token").unwrap(), Some("legacy-token".to_string()));
/// store.remove_item("token").unwrap();
/// ```
pub struct KeyringStore {
    service: String,
    known_keys: Mutex<BTreeSet<String>>,
}

impl KeyringStore {
    /// Creates a store under the default service name
    pub fn new() -> Self {
        Self::with_service("StudioAccess")
    }

    /// Creates a store under a custom service name
    pub fn with_service(service: impl Into<String>) -> Self {
        let mut known = BTreeSet::new();
        known.insert("token".to_string());
        Self {
            service: service.into(),
            known_keys: Mutex::new(known),
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    /// Keys `clear` will remove
    pub fn known_keys(&self) -> Vec<String> {
        self.known_keys
            .lock()
            .map(|keys| keys.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn remember(&self, key: &str) {
        if let Ok(mut keys) = self.known_keys.lock() {
            keys.insert(key.to_string());
        }
    }
}

impl Default for KeyringStore {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalStore for KeyringStore {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        let entry = Entry::new(&self.service, key)?;
        match entry.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let entry = Entry::new(&self.service, key)?;
        entry.set_password(value)?;
        self.remember(key);
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        let entry = Entry::new(&self.service, key)?;
        match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn clear(&self) -> Result<(), StorageError> {
        remove_each(&self.known_keys(), |key| self.remove_item(key))
    }
}

/// Removes every key, continuing past failures
///
/// # Returns
///
/// The first failure, once every key has been attempted
fn remove_each<F>(keys: &[String], mut remove: F) -> Result<(), StorageError>
where
    F: FnMut(&str) -> Result<(), StorageError>,
{
    let mut first_error = None;
    for key in keys {
        if let Err(e) = remove(key) {
            tracing::warn!("Failed to clear keyring entry '{}': {}", key, e);
            first_error.get_or_insert(e);
        }
    }
    first_error.map_or(Ok(()), Err)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_store() -> KeyringStore {
        KeyringStore::with_service("StudioAccess-Test")
    }

    #[test]
    fn test_store_creation() {
        assert_eq!(KeyringStore::new().service(), "StudioAccess");
        assert_eq!(test_store().service(), "StudioAccess-Test");
    }

    #[test]
    fn test_remove_each_reports_first_failure_after_trying_all() {
        let keys = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let mut attempted = Vec::new();

        let result = remove_each(&keys, |key| {
            attempted.push(key.to_string());
            match key {
                "a" => Ok(()),
                other => Err(StorageError::Local(format!("locked: {}", other))),
            }
        });

        assert_eq!(attempted, keys);
        assert!(matches!(result, Err(StorageError::Local(msg)) if msg == "locked: b"));
    }

    #[test]
    fn test_remove_each_all_succeed() {
        let keys = vec!["token".to_string()];
        assert!(remove_each(&keys, |_| Ok(())).is_ok());
    }

    #[test]
    fn test_token_is_always_known() {
        assert_eq!(test_store().known_keys(), vec!["token".to_string()]);
    }

    #[test]
    #[ignore = "requires an OS credential service"]
    fn test_store_and_retrieve() {
        let store = test_store();
        let _ = store.remove_item("test-item-1");

        store.set_item("test-item-1", "secret").unwrap();
        assert_eq!(store.get_item("test-item-1").unwrap(), Some("secret".to_string()));
        assert!(store.known_keys().contains(&"test-item-1".to_string()));

        store.remove_item("test-item-1").unwrap();
        assert_eq!(store.get_item("test-item-1").unwrap(), None);
    }

    #[test]
    #[ignore = "requires an OS credential service"]
    fn test_remove_missing_is_ok() {
        let store = test_store();
        assert!(store.remove_item("nonexistent-item-67890").is_ok());
    }

    #[test]
    #[ignore = "requires an OS credential service"]
    fn test_clear_removes_written_keys() {
        let store = test_store();
        store.set_item("test-clear-a", "1").unwrap();
        store.set_item("test-clear-b", "2").unwrap();

        store.clear().unwrap();
        assert_eq!(store.get_item("test-clear-a").unwrap(), None);
        assert_eq!(store.get_item("test-clear-b").unwrap(), None);
    }
}
