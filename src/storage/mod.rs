//! Storage module - Best-effort key-value persistence
//!
//! [`Storage`] fronts two backends:
//! - a host-provided asynchronous store ([`HostStorage`]), used when supplied
//! - a synchronous local store ([`LocalStore`]) otherwise
//!
//! Faults never reach the caller as errors. Every operation returns a
//! [`StorageOutcome`] that is either `Ok` or `Degraded` with the default
//! value and the cause.

mod host;
mod keyring_store;
mod local;

pub use host::{HostStorage, MemoryHostStorage};
pub use keyring_store::KeyringStore;
pub use local::{FileLocalStore, LocalStore, MemoryLocalStore};

use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

/// Errors raised by storage backends
#[derive(Debug, Error)]
pub enum StorageError {
    /// Host storage rejected the operation
    #[error("Host storage error: {0}")]
    Host(String),

    /// Local storage rejected the operation
    #[error("Local storage error: {0}")]
    Local(String),

    /// Value could not be (de)serialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A lock was poisoned by a panicking writer
    #[error("Storage lock poisoned")]
    Poisoned,
}

/// Result of a storage operation that never fails outright
#[derive(Debug)]
pub enum StorageOutcome<T> {
    /// The backend answered
    Ok(T),
    /// The backend failed; `value` is the substituted default
    Degraded { value: T, cause: StorageError },
}

impl<T> StorageOutcome<T> {
    /// Returns the value, discarding any fault
    pub fn into_value(self) -> T {
        match self {
            Self::Ok(value) | Self::Degraded { value, .. } => value,
        }
    }

    /// Borrows the value, `Ok` or substituted
    pub fn value(&self) -> &T {
        match self {
            Self::Ok(value) | Self::Degraded { value, .. } => value,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded { .. })
    }

    /// Returns the fault behind a `Degraded` outcome
    pub fn cause(&self) -> Option<&StorageError> {
        match self {
            Self::Ok(_) => None,
            Self::Degraded { cause, .. } => Some(cause),
        }
    }

    fn from_result(result: Result<T, StorageError>, fallback: impl FnOnce() -> T, op: &str, key: &str) -> Self {
        match result {
            Ok(value) => Self::Ok(value),
            Err(cause) => {
                tracing::warn!("Storage {} failed for '{}': {}", op, key, cause);
                Self::Degraded {
                    value: fallback(),
                    cause,
                }
            }
        }
    }
}

/// Which backend a [`Storage`] was built with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageMode {
    Host,
    Local,
}

enum Backend {
    Host(Arc<dyn HostStorage>),
    Local,
}

/// Key-value storage with a backend fixed at construction
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use serde_json::{json, Value};
/// use studio_access::storage::{MemoryLocalStore, Storage};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let storage = Storage::local(Arc::new(MemoryLocalStore::new()));
/// storage.set_value("editor", json!({"zoom": 2})).await;
/// let value = storage.get_value("editor", Value::Null).await.into_value();
/// assert_eq!(value, json!({"zoom": 2}));
/// # }
/// ```
pub struct Storage {
    backend: Backend,
    local: Arc<dyn LocalStore>,
}

impl Storage {
    /// Builds storage, probing `host` once
    ///
    /// The host backend is used only when supplied and available; otherwise
    /// the local store serves every operation for the lifetime of this value.
    pub fn new(host: Option<Arc<dyn HostStorage>>, local: Arc<dyn LocalStore>) -> Self {
        let backend = match host {
            Some(host) if host.is_available() => {
                tracing::debug!("Using host-backed storage");
                Backend::Host(host)
            }
            Some(_) => {
                tracing::debug!("Host storage unavailable, using local fallback");
                Backend::Local
            }
            None => Backend::Local,
        };
        Self { backend, local }
    }

    /// Storage that always uses the local store
    pub fn local(local: Arc<dyn LocalStore>) -> Self {
        Self::new(None, local)
    }

    /// Backend chosen at construction
    pub fn mode(&self) -> StorageMode {
        match self.backend {
            Backend::Host(_) => StorageMode::Host,
            Backend::Local => StorageMode::Local,
        }
    }

    /// Reads `key` from the active backend
    ///
    /// # Arguments
    ///
    /// * `key` - Storage key
    /// * `default` - Value returned when the key is missing or the backend fails
    ///
    /// # Returns
    ///
    /// `Ok` with the stored value or `default` when absent, `Degraded` with
    /// `default` on a backend fault
    pub async fn get_value(&self, key: &str, default: Value) -> StorageOutcome<Value> {
        match &self.backend {
            Backend::Host(host) => match host.get(key).await {
                Ok(value) => StorageOutcome::Ok(value.unwrap_or(default)),
                Err(cause) => StorageOutcome::from_result(Err(cause), || default, "get", key),
            },
            Backend::Local => self.get_value_sync(key, default),
        }
    }

    /// Writes `key` to the active backend
    ///
    /// The host receives `value` unchanged; the local store gets strings
    /// verbatim and everything else as JSON text.
    ///
    /// # Arguments
    ///
    /// * `key` - Storage key
    /// * `value` - Value to persist
    pub async fn set_value(&self, key: &str, value: Value) -> StorageOutcome<()> {
        match &self.backend {
            Backend::Host(host) => StorageOutcome::from_result(host.set(key, value).await, || (), "set", key),
            Backend::Local => self.set_value_sync(key, value),
        }
    }

    /// Removes `key` from the active backend
    ///
    /// # Arguments
    ///
    /// * `key` - Storage key; a missing key is not a fault
    pub async fn remove_value(&self, key: &str) -> StorageOutcome<()> {
        match &self.backend {
            Backend::Host(host) => StorageOutcome::from_result(host.delete(key).await, || (), "remove", key),
            Backend::Local => self.remove_value_sync(key),
        }
    }

    /// Removes every key from the active backend
    ///
    /// # Returns
    ///
    /// `Degraded` with the cause when the backend could not clear everything
    pub async fn clear_all(&self) -> StorageOutcome<()> {
        match &self.backend {
            Backend::Host(host) => StorageOutcome::from_result(host.clear().await, || (), "clear", "*"),
            Backend::Local => self.clear_all_sync(),
        }
    }

    /// Reads `key` from the local store regardless of backend
    ///
    /// Stored text that is not valid JSON comes back as a raw string.
    pub fn get_value_sync(&self, key: &str, default: Value) -> StorageOutcome<Value> {
        match self.local.get_item(key) {
            Ok(Some(raw)) => StorageOutcome::Ok(decode_stored(raw)),
            Ok(None) => StorageOutcome::Ok(default),
            Err(cause) => StorageOutcome::from_result(Err(cause), || default, "get", key),
        }
    }

    /// Writes `key` to the local store; strings are stored verbatim
    pub fn set_value_sync(&self, key: &str, value: Value) -> StorageOutcome<()> {
        let result = encode_stored(&value).and_then(|text| self.local.set_item(key, &text));
        StorageOutcome::from_result(result, || (), "set", key)
    }

    /// Removes `key` from the local store regardless of backend
    pub fn remove_value_sync(&self, key: &str) -> StorageOutcome<()> {
        StorageOutcome::from_result(self.local.remove_item(key), || (), "remove", key)
    }

    /// Clears the local store regardless of backend
    pub fn clear_all_sync(&self) -> StorageOutcome<()> {
        StorageOutcome::from_result(self.local.clear(), || (), "clear", "*")
    }
}

fn decode_stored(raw: String) -> Value {
    serde_json::from_str(&raw).unwrap_or(Value::String(raw))
}

fn encode_stored(value: &Value) -> Result<String, StorageError> {
    match value {
        Value::String(s) => Ok(s.clone()),
        other => Ok(serde_json::to_string(other)?),
    }
}
