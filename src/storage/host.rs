//! Host-provided asynchronous key-value storage
//!
//! Some embedding hosts hand the page a persistence API of their own. When one
//! is supplied it takes precedence over the local store.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use super::StorageError;

/// Asynchronous key-value capability supplied by the embedding host
///
/// Values are passed through unchanged; the host does its own serialization.
#[async_trait]
pub trait HostStorage: Send + Sync {
    /// Capability probe, checked once when [`Storage`](super::Storage) is built
    fn is_available(&self) -> bool {
        true
    }

    async fn get(&self, key: &str) -> Result<Option<Value>, StorageError>;

    async fn set(&self, key: &str, value: Value) -> Result<(), StorageError>;

    async fn delete(&self, key: &str) -> Result<(), StorageError>;

    async fn clear(&self) -> Result<(), StorageError>;
}

/// In-memory host storage
#[derive(Debug, Default)]
pub struct MemoryHostStorage {
    values: RwLock<HashMap<String, Value>>,
}

impl MemoryHostStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.values.read().await.len()
    }
}

#[async_trait]
impl HostStorage for MemoryHostStorage {
    async fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        Ok(self.values.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StorageError> {
        self.values.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.values.write().await.remove(key);
        Ok(())
    }

    async fn clear(&self) -> Result<(), StorageError> {
        self.values.write().await.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_memory_host_storage() {
        let host = MemoryHostStorage::new();
        assert!(host.is_available());

        host.set("draft", json!({"title": "Launch"})).await.unwrap();
        assert_eq!(host.get("draft").await.unwrap(), Some(json!({"title": "Launch"})));
        assert_eq!(host.len().await, 1);

        host.delete("draft").await.unwrap();
        assert_eq!(host.get("draft").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_memory_host_storage_clear() {
        let host = MemoryHostStorage::new();
        host.set("a", json!(1)).await.unwrap();
        host.set("b", json!("two")).await.unwrap();
        host.clear().await.unwrap();
        assert_eq!(host.len().await, 0);
    }
}
