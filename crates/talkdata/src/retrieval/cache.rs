//! Per-document index cache with single-flight population
//!
//! Keyed by the document's content hash. Concurrent first use of the same key
//! shares one in-flight indexing run; later callers reuse its result.
//!
//! Entries leaving the cache (evicted, invalidated or cleared) are retired
//! rather than released: a request may still be searching them, or an
//! indexing run may still be filling them. [`IndexCache::reap`] hands back the
//! collections that no caller holds any more.

use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::OnceCell;

use crate::error::Result;

/// A document whose chunks are embedded and stored in a collection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedDocument {
    /// Vector store collection holding the chunks; unique per indexing run
    pub collection: String,
    /// Number of chunks indexed
    pub chunk_count: usize,
}

/// Cache statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct CacheStats {
    /// Lookups served by an existing or in-flight entry
    pub hits: u64,
    /// Lookups that started indexing
    pub misses: u64,
    /// Entries removed to stay within capacity
    pub evictions: u64,
}

type Slot = Arc<OnceCell<Arc<IndexedDocument>>>;

/// Bounded map from content hash to indexed document
pub struct IndexCache {
    entries: DashMap<String, Slot>,
    /// Insertion order, oldest first
    order: Mutex<VecDeque<String>>,
    /// Slots removed from `entries` whose collection is not yet released
    retired: Mutex<Vec<Slot>>,
    capacity: usize,
    stats: Mutex<CacheStats>,
}

impl IndexCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: DashMap::new(),
            order: Mutex::new(VecDeque::new()),
            retired: Mutex::new(Vec::new()),
            capacity: capacity.max(1),
            stats: Mutex::new(CacheStats::default()),
        }
    }

    /// Return the cached entry for `key`, running `index` only if no caller
    /// has populated it yet
    ///
    /// A failed run leaves the slot empty for the next caller. A run whose
    /// slot is evicted before it finishes still completes for the callers
    /// waiting on it; its collection is retired with the slot.
    pub async fn get_or_index<F, Fut>(&self, key: &str, index: F) -> Result<Arc<IndexedDocument>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<IndexedDocument>>,
    {
        let mut inserted = false;
        let slot = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| {
                inserted = true;
                Arc::new(OnceCell::new())
            })
            .value()
            .clone();

        if inserted {
            self.record_insert(key);
            self.stats.lock().misses += 1;
        } else {
            self.stats.lock().hits += 1;
        }

        let entry = slot
            .get_or_try_init(|| async { index().await.map(Arc::new) })
            .await?
            .clone();

        Ok(entry)
    }

    /// Remove an entry; returns whether it was present
    pub fn invalidate(&self, key: &str) -> bool {
        match self.entries.remove(key) {
            Some((_, slot)) => {
                self.order.lock().retain(|k| k != key);
                self.retired.lock().push(slot);
                true
            }
            None => false,
        }
    }

    /// Remove every entry; returns how many were removed
    pub fn clear(&self) -> usize {
        let keys: Vec<String> = self.order.lock().drain(..).collect();
        let mut retired = self.retired.lock();
        for key in &keys {
            if let Some((_, slot)) = self.entries.remove(key) {
                retired.push(slot);
            }
        }
        keys.len()
    }

    /// Take the collections of retired entries that nobody is using any more
    ///
    /// An entry stays retired while a caller still holds it or while its
    /// indexing run is in flight. Retired slots whose run failed are dropped.
    pub fn reap(&self) -> Vec<String> {
        let mut released = Vec::new();
        self.retired.lock().retain(|slot| {
            if Arc::strong_count(slot) > 1 {
                return true;
            }
            match slot.get() {
                Some(entry) if Arc::strong_count(entry) > 1 => true,
                Some(entry) => {
                    released.push(entry.collection.clone());
                    false
                }
                None => false,
            }
        });
        released
    }

    /// Number of retired entries still waiting to be released
    pub fn retired_len(&self) -> usize {
        self.retired.lock().len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn stats(&self) -> CacheStats {
        *self.stats.lock()
    }

    fn record_insert(&self, key: &str) {
        let mut order = self.order.lock();
        order.push_back(key.to_string());

        let mut evicted = 0u64;
        while order.len() > self.capacity {
            let Some(oldest) = order.pop_front() else { break };
            if let Some((_, slot)) = self.entries.remove(&oldest) {
                self.retired.lock().push(slot);
                evicted += 1;
            }
        }

        if evicted > 0 {
            self.stats.lock().evictions += evicted;
            tracing::debug!(evicted, "Evicted cached document indexes");
        }
    }
}
