//! # Time-Boxed Cache
//!
//! Key/value cache where every entry carries an absolute expiry timestamp.
//!
//! ## Features
//! - Per-entry TTL stored as `expires_at`, compared against wall-clock time,
//!   so staleness survives process suspension unchanged
//! - Lazy eviction on read plus an opportunistic [`TimeBoxedCache::clean_expired`] sweep
//! - Pluggable backend ([`MemoryStore`], [`FileStore`]) with all records
//!   under the [`CACHE_PREFIX`] namespace
//! - Backend failures surface as [`StorageError`] instead of silent misses
//!
//! ## Record Layout
//!
//! ```text
//! key:   cache:/predictions
//! value: {"value": <payload>, "stored_at": "2024-01-01T00:00:00Z", "expires_at": "2024-01-01T00:30:00Z"}
//! ```
//!
//! ## Example
//! ```no_run
//! use std::time::Duration;
//! use lib_net::TimeBoxedCache;
//!
//! # async fn demo() -> Result<(), lib_core::StorageError> {
//! let cache = TimeBoxedCache::in_memory();
//! cache.set("/predictions", &vec![1, 2, 3], Duration::from_secs(1800)).await?;
//! let hit: Option<Vec<u32>> = cache.get("/predictions").await?;
//! assert_eq!(hit, Some(vec![1, 2, 3]));
//! # Ok(())
//! # }
//! ```

mod file_store;
mod store;

pub use file_store::FileStore;
pub use store::{CacheStore, MemoryStore};

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use lib_core::StorageError;
use lib_utils::{Clock, SystemClock};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

/// Prefix separating cache records from other state in a shared store.
pub const CACHE_PREFIX: &str = "cache:";

/// A cached value with its lifetime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    pub value: T,
    pub stored_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl<T> CacheEntry<T> {
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

/// Entry timestamps without the payload.
#[derive(Debug, Deserialize)]
struct EntryMeta {
    stored_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

/// TTL cache over a [`CacheStore`].
///
/// Cheap to share behind an `Arc`; every method takes `&self`.
pub struct TimeBoxedCache {
    store: Arc<dyn CacheStore>,
    clock: Arc<dyn Clock>,
}

impl TimeBoxedCache {
    pub fn new(store: Arc<dyn CacheStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Memory-backed cache on the system clock.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()), Arc::new(SystemClock))
    }

    fn namespaced(key: &str) -> String {
        format!("{CACHE_PREFIX}{key}")
    }

    /// Store `value` under `key` for `ttl`, replacing any existing entry.
    ///
    /// A zero TTL could never produce a live entry, so it removes `key` instead.
    pub async fn set<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> Result<(), StorageError> {
        if ttl.is_zero() {
            debug!(key = %key, "Zero TTL, removing instead of storing");
            return self.remove(key).await;
        }

        let stored_at = self.clock.now();
        let expires_at = chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|ttl| stored_at.checked_add_signed(ttl))
            .ok_or_else(|| StorageError::Backend(format!("TTL {ttl:?} is out of range")))?;

        let entry = CacheEntry {
            value,
            stored_at,
            expires_at,
        };
        let record = serde_json::to_string(&entry)?;
        self.store.write(&Self::namespaced(key), record).await?;

        debug!(key = %key, ttl_secs = ttl.as_secs(), "Cache entry stored");
        Ok(())
    }

    /// Return the live value for `key`, evicting it if it has expired.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StorageError> {
        let full_key = Self::namespaced(key);
        let Some(record) = self.store.read(&full_key).await? else {
            return Ok(None);
        };

        let entry: CacheEntry<Value> = serde_json::from_str(&record)?;
        if !entry.is_live(self.clock.now()) {
            debug!(key = %key, expired_at = %entry.expires_at, "Cache entry expired, evicting");
            self.store.delete(&full_key).await?;
            return Ok(None);
        }

        Ok(Some(T::deserialize(entry.value)?))
    }

    /// Whether `key` holds a live entry. Parses only the timestamps.
    pub async fn has(&self, key: &str) -> Result<bool, StorageError> {
        let full_key = Self::namespaced(key);
        let Some(meta) = self.read_meta(&full_key).await? else {
            return Ok(false);
        };

        if meta.expires_at <= self.clock.now() {
            self.store.delete(&full_key).await?;
            return Ok(false);
        }
        Ok(true)
    }

    /// Delete `key`. Absent keys are a no-op.
    pub async fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.store.delete(&Self::namespaced(key)).await
    }

    /// Delete every cache record, leaving non-cache keys in the store alone.
    pub async fn clear(&self) -> Result<(), StorageError> {
        let keys = self.namespaced_keys().await?;
        let count = keys.len();
        for key in keys {
            self.store.delete(&key).await?;
        }
        info!(count, "Cache cleared");
        Ok(())
    }

    /// Time left before `key` expires, `Some(0)` once expired, `None` if absent.
    pub async fn remaining_ttl(&self, key: &str) -> Result<Option<Duration>, StorageError> {
        let Some(meta) = self.read_meta(&Self::namespaced(key)).await? else {
            return Ok(None);
        };
        let left = (meta.expires_at - self.clock.now())
            .to_std()
            .unwrap_or(Duration::ZERO);
        Ok(Some(left))
    }

    /// When the entry for `key` was written, if present.
    pub async fn stored_at(&self, key: &str) -> Result<Option<DateTime<Utc>>, StorageError> {
        Ok(self
            .read_meta(&Self::namespaced(key))
            .await?
            .map(|meta| meta.stored_at))
    }

    /// Evict every expired cache record and return how many were removed.
    ///
    /// Records that no longer parse are evicted too.
    pub async fn clean_expired(&self) -> Result<usize, StorageError> {
        let now = self.clock.now();
        let mut evicted = 0;

        for key in self.namespaced_keys().await? {
            let expired = match self.read_meta(&key).await {
                Ok(Some(meta)) => meta.expires_at <= now,
                // Deleted between listing and reading.
                Ok(None) => false,
                Err(StorageError::Serialization(e)) => {
                    warn!(key = %key, error = %e, "Evicting unreadable cache record");
                    true
                }
                Err(e) => return Err(e),
            };

            if expired {
                self.store.delete(&key).await?;
                evicted += 1;
            }
        }

        if evicted > 0 {
            info!(evicted, "Expired cache entries cleaned");
        }
        Ok(evicted)
    }

    async fn read_meta(&self, full_key: &str) -> Result<Option<EntryMeta>, StorageError> {
        match self.store.read(full_key).await? {
            Some(record) => Ok(Some(serde_json::from_str(&record)?)),
            None => Ok(None),
        }
    }

    async fn namespaced_keys(&self) -> Result<Vec<String>, StorageError> {
        Ok(self
            .store
            .keys()
            .await?
            .into_iter()
            .filter(|key| key.starts_with(CACHE_PREFIX))
            .collect())
    }
}
