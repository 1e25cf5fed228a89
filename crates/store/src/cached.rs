//! Two-tier model store: LocalCache (L1) in front of any ModelStore (L2).
//!
//! Successful writes refresh L1 with the committed counter. A conflict or a
//! missing model evicts the entry so the retry reads through to L2.

use crate::local::LocalCache;
use crate::store::{ModelStore, StoredModel};
use async_trait::async_trait;
use bandit_core::{BanditError, BanditResult, ModelKey};
use std::sync::Arc;

pub struct CachedModelStore<S> {
    inner: S,
    local: Arc<LocalCache>,
}

impl<S: ModelStore> CachedModelStore<S> {
    pub fn new(inner: S, ttl_secs: u64, max_entries: usize) -> Self {
        Self {
            inner,
            local: Arc::new(LocalCache::new(ttl_secs, max_entries)),
        }
    }

    pub fn local(&self) -> Arc<LocalCache> {
        self.local.clone()
    }
}

#[async_trait]
impl<S: ModelStore> ModelStore for CachedModelStore<S> {
    async fn load(&self, key: &ModelKey) -> BanditResult<Option<StoredModel>> {
        if let Some(hit) = self.local.get(key) {
            metrics::counter!("store.l1.hit").increment(1);
            return Ok(Some(hit));
        }
        metrics::counter!("store.l1.miss").increment(1);

        let loaded = self.inner.load(key).await?;
        if let Some(model) = &loaded {
            self.local.put(key.clone(), model.clone());
        }
        Ok(loaded)
    }

    async fn create_if_absent(&self, key: &ModelKey, blob: Vec<u8>) -> BanditResult<()> {
        self.inner.create_if_absent(key, blob.clone()).await?;
        self.local
            .put(key.clone(), StoredModel { blob, counter: 0 });
        Ok(())
    }

    async fn conditional_write(
        &self,
        key: &ModelKey,
        blob: Vec<u8>,
        expected: u64,
    ) -> BanditResult<u64> {
        match self.inner.conditional_write(key, blob.clone(), expected).await {
            Ok(counter) => {
                self.local.put(key.clone(), StoredModel { blob, counter });
                Ok(counter)
            }
            Err(e @ (BanditError::VersionConflict { .. } | BanditError::NotFound(_))) => {
                self.local.invalidate(key);
                Err(e)
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryModelStore;

    #[tokio::test]
    async fn test_reads_are_served_from_l1() {
        let backing = InMemoryModelStore::new();
        let cached = CachedModelStore::new(backing.clone(), 60, 100);
        let key = ModelKey::new("m", "1");

        cached.create_if_absent(&key, b"v0".to_vec()).await.unwrap();
        // Bypass the cache: L1 still serves the old value.
        backing.conditional_write(&key, b"v1".to_vec(), 0).await.unwrap();
        assert_eq!(cached.load(&key).await.unwrap().unwrap().counter, 0);
    }

    #[tokio::test]
    async fn test_conflict_evicts_stale_entry() {
        let backing = InMemoryModelStore::new();
        let cached = CachedModelStore::new(backing.clone(), 60, 100);
        let key = ModelKey::new("m", "1");

        cached.create_if_absent(&key, b"v0".to_vec()).await.unwrap();
        backing.conditional_write(&key, b"v1".to_vec(), 0).await.unwrap();

        let stale = cached.load(&key).await.unwrap().unwrap();
        let err = cached
            .conditional_write(&key, b"v1b".to_vec(), stale.counter)
            .await;
        assert!(matches!(err, Err(BanditError::VersionConflict { .. })));

        let fresh = cached.load(&key).await.unwrap().unwrap();
        assert_eq!(fresh.counter, 1);
        assert_eq!(fresh.blob, b"v1".to_vec());

        assert_eq!(
            cached
                .conditional_write(&key, b"v2".to_vec(), fresh.counter)
                .await
                .unwrap(),
            2
        );
        assert_eq!(cached.load(&key).await.unwrap().unwrap().blob, b"v2".to_vec());
    }
}
