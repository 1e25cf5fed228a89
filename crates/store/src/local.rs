//! In-process TTL cache backed by DashMap for lock-free concurrent access.
//! Serves as L1 in front of a remote model store to cut read round trips.

use crate::store::StoredModel;
use bandit_core::ModelKey;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

struct CacheEntry {
    model: StoredModel,
    inserted_at: Instant,
}

/// Lock-free local cache of recently read model states.
pub struct LocalCache {
    store: Arc<DashMap<ModelKey, CacheEntry>>,
    ttl: Duration,
    max_entries: usize,
}

impl LocalCache {
    pub fn new(ttl_secs: u64, max_entries: usize) -> Self {
        Self {
            store: Arc::new(DashMap::with_capacity(max_entries.min(1024))),
            ttl: Duration::from_secs(ttl_secs),
            max_entries,
        }
    }

    /// Cached state, or None if expired or missing.
    pub fn get(&self, key: &ModelKey) -> Option<StoredModel> {
        let entry = self.store.get(key)?;
        if entry.inserted_at.elapsed() > self.ttl {
            drop(entry);
            self.store.remove(key);
            return None;
        }
        Some(entry.model.clone())
    }

    /// Insert unless it would move the entry backwards to an older counter.
    pub fn put(&self, key: ModelKey, model: StoredModel) {
        if self.store.len() >= self.max_entries && !self.store.contains_key(&key) {
            return;
        }
        let fresh = CacheEntry {
            model,
            inserted_at: Instant::now(),
        };
        match self.store.entry(key) {
            Entry::Occupied(mut slot) => {
                if slot.get().model.counter <= fresh.model.counter {
                    slot.insert(fresh);
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(fresh);
            }
        }
    }

    pub fn invalidate(&self, key: &ModelKey) {
        self.store.remove(key);
    }

    /// Remove expired entries. Call this periodically from a background task.
    pub fn evict_expired(&self) -> usize {
        let before = self.store.len();
        self.store
            .retain(|_, entry| entry.inserted_at.elapsed() <= self.ttl);
        before.saturating_sub(self.store.len())
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stored(counter: u64) -> StoredModel {
        StoredModel {
            blob: counter.to_string().into_bytes(),
            counter,
        }
    }

    #[test]
    fn test_put_never_goes_backwards() {
        let cache = LocalCache::new(60, 10);
        let key = ModelKey::new("m", "1");
        cache.put(key.clone(), stored(3));
        cache.put(key.clone(), stored(2));
        assert_eq!(cache.get(&key).unwrap().counter, 3);
        cache.put(key.clone(), stored(4));
        assert_eq!(cache.get(&key).unwrap().counter, 4);
    }

    #[test]
    fn test_capacity_is_respected() {
        let cache = LocalCache::new(60, 1);
        cache.put(ModelKey::new("a", "1"), stored(0));
        cache.put(ModelKey::new("b", "1"), stored(0));
        assert_eq!(cache.len(), 1);
        assert!(cache.get(&ModelKey::new("b", "1")).is_none());
    }

    #[test]
    fn test_zero_ttl_expires() {
        let cache = LocalCache::new(0, 10);
        let key = ModelKey::new("m", "1");
        cache.put(key.clone(), stored(1));
        std::thread::sleep(Duration::from_millis(5));
        assert!(cache.get(&key).is_none());
        assert!(cache.is_empty());
    }
}
