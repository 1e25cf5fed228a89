//! Persistence contract for model state.

use async_trait::async_trait;
use bandit_core::{BanditResult, ModelKey};
use std::sync::Arc;

/// An encoded model state together with the counter it was stored under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredModel {
    pub blob: Vec<u8>,
    pub counter: u64,
}

/// Key-value store with optimistic-concurrency writes.
///
/// The counter of a freshly created model is 0. Every successful
/// `conditional_write` increments it by exactly one.
#[async_trait]
pub trait ModelStore: Send + Sync {
    /// Current blob and counter, or `None` if the model was never created.
    async fn load(&self, key: &ModelKey) -> BanditResult<Option<StoredModel>>;

    /// Persist the initial state at counter 0. Fails with `AlreadyExists`.
    async fn create_if_absent(&self, key: &ModelKey, blob: Vec<u8>) -> BanditResult<()>;

    /// Replace the blob only if the stored counter equals `expected`.
    /// Returns the new counter, `VersionConflict` on mismatch, `NotFound` if absent.
    async fn conditional_write(
        &self,
        key: &ModelKey,
        blob: Vec<u8>,
        expected: u64,
    ) -> BanditResult<u64>;
}

#[async_trait]
impl<S: ModelStore + ?Sized> ModelStore for Arc<S> {
    async fn load(&self, key: &ModelKey) -> BanditResult<Option<StoredModel>> {
        (**self).load(key).await
    }

    async fn create_if_absent(&self, key: &ModelKey, blob: Vec<u8>) -> BanditResult<()> {
        (**self).create_if_absent(key, blob).await
    }

    async fn conditional_write(
        &self,
        key: &ModelKey,
        blob: Vec<u8>,
        expected: u64,
    ) -> BanditResult<u64> {
        (**self).conditional_write(key, blob, expected).await
    }
}
