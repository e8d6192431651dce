//! Raw record storage behind [`TimeBoxedCache`](super::TimeBoxedCache).
//!
//! Stores deal in opaque strings keyed by the full (namespaced) key; they know
//! nothing about expiry.

use std::collections::HashMap;

use async_trait::async_trait;
use lib_core::StorageError;
use parking_lot::RwLock;

/// Key-value backend for cache records.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn read(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Replace the record for `key` atomically.
    async fn write(&self, key: &str, record: String) -> Result<(), StorageError>;

    /// Deleting an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<(), StorageError>;

    /// Every key currently present, cache records or not.
    async fn keys(&self) -> Result<Vec<String>, StorageError>;
}

/// In-memory store; the default backend.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.records.read().get(key).cloned())
    }

    async fn write(&self, key: &str, record: String) -> Result<(), StorageError> {
        self.records.write().insert(key.to_string(), record);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.records.write().remove(key);
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.records.read().keys().cloned().collect())
    }
}
