#![warn(clippy::unwrap_used)]

pub mod cached;
pub mod local;
pub mod memory;
pub mod redis_store;
pub mod store;

pub use cached::CachedModelStore;
pub use local::LocalCache;
pub use memory::InMemoryModelStore;
pub use redis_store::RedisModelStore;
pub use store::{ModelStore, StoredModel};

use bandit_core::config::{AppConfig, StoreBackend};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Build the configured store, wrapped in the L1 cache when enabled.
pub async fn connect(config: &AppConfig) -> anyhow::Result<Arc<dyn ModelStore>> {
    let store: Arc<dyn ModelStore> = match (config.store.backend, config.store.cache_enabled) {
        (StoreBackend::Memory, _) => {
            info!("Using in-memory model store");
            Arc::new(InMemoryModelStore::new())
        }
        (StoreBackend::Redis, false) => {
            Arc::new(RedisModelStore::connect(&config.redis, &config.store).await?)
        }
        (StoreBackend::Redis, true) => {
            let redis = RedisModelStore::connect(&config.redis, &config.store).await?;
            info!(
                ttl_secs = config.store.cache_ttl_secs,
                max_entries = config.store.cache_max_entries,
                "Local model cache enabled"
            );
            let cached = CachedModelStore::new(
                redis,
                config.store.cache_ttl_secs,
                config.store.cache_max_entries,
            );
            spawn_cache_maintenance(cached.local());
            Arc::new(cached)
        }
    };
    Ok(store)
}

fn spawn_cache_maintenance(local: Arc<LocalCache>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        loop {
            interval.tick().await;
            let evicted = local.evict_expired();
            if evicted > 0 {
                debug!(evicted = evicted, "Local model cache eviction complete");
            }
        }
    });
}
