//! Persistence port for jobs and decisions
//!
//! The orchestrator only needs a key-value store of JSON documents.
//! [`MemoryStore`] keeps the most recently saved entries in process.

use async_trait::async_trait;
use lru::LruCache;
use parking_lot::Mutex;
use serde_json::Value;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::StoreError;

/// Entries kept by [`MemoryStore::default`]
pub const DEFAULT_RETENTION: usize = 1000;

/// Key-value store of JSON documents
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Load a document, `None` when the key is unknown
    async fn load(&self, key: &str) -> Result<Option<Value>, StoreError>;

    /// Insert or replace a document
    async fn save(&self, key: &str, value: Value) -> Result<(), StoreError>;

    /// Remove a document. Returns whether it existed.
    async fn delete(&self, key: &str) -> Result<bool, StoreError>;

    /// Check if a document exists
    async fn contains(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.load(key).await?.is_some())
    }

    /// Backend name for logs
    fn backend_name(&self) -> &'static str {
        "unknown"
    }
}

/// In-memory store with bounded retention.
///
/// Once `capacity` is reached, saving a new key trims the least recently
/// saved entry. Loads do not refresh retention.
pub struct MemoryStore {
    entries: Mutex<LruCache<String, Value>>,
    evictions: AtomicU64,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(DEFAULT_RETENTION)
    }
}

impl MemoryStore {
    /// Create a store keeping at most `capacity` entries (at least 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            evictions: AtomicU64::new(0),
        }
    }

    /// Create a store that never trims entries
    pub fn unbounded() -> Self {
        Self {
            entries: Mutex::new(LruCache::unbounded()),
            evictions: AtomicU64::new(0),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.entries.lock().cap().get()
    }

    /// Entries trimmed since creation
    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl JobStore for MemoryStore {
    async fn load(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.entries.lock().peek(key).cloned())
    }

    async fn save(&self, key: &str, value: Value) -> Result<(), StoreError> {
        let evicted = self.entries.lock().push(key.to_string(), value);

        if let Some((evicted_key, _)) = evicted {
            if evicted_key != key {
                self.evictions.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(key = %evicted_key, "Store entry trimmed");
            }
        }

        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.entries.lock().pop(key).is_some())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
