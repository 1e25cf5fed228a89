//! DashMap-backed model store for tests, development and single-node runs.

use crate::store::{ModelStore, StoredModel};
use async_trait::async_trait;
use bandit_core::{BanditError, BanditResult, ModelKey};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;

/// In-process store. Clone-friendly via Arc; each key's compare-and-swap runs
/// under that key's shard lock.
#[derive(Clone, Default)]
pub struct InMemoryModelStore {
    models: Arc<DashMap<ModelKey, StoredModel>>,
}

impl InMemoryModelStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ModelStore for InMemoryModelStore {
    async fn load(&self, key: &ModelKey) -> BanditResult<Option<StoredModel>> {
        Ok(self.models.get(key).map(|entry| entry.value().clone()))
    }

    async fn create_if_absent(&self, key: &ModelKey, blob: Vec<u8>) -> BanditResult<()> {
        match self.models.entry(key.clone()) {
            Entry::Occupied(_) => Err(BanditError::AlreadyExists(key.to_string())),
            Entry::Vacant(slot) => {
                slot.insert(StoredModel { blob, counter: 0 });
                Ok(())
            }
        }
    }

    async fn conditional_write(
        &self,
        key: &ModelKey,
        blob: Vec<u8>,
        expected: u64,
    ) -> BanditResult<u64> {
        let mut entry = self
            .models
            .get_mut(key)
            .ok_or_else(|| BanditError::NotFound(key.to_string()))?;

        if entry.counter != expected {
            return Err(BanditError::VersionConflict {
                model: key.to_string(),
                expected,
                actual: entry.counter,
            });
        }

        entry.counter += 1;
        entry.blob = blob;
        Ok(entry.counter)
    }
}
