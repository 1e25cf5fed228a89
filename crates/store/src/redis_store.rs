//! Redis-backed model store.
//! Each model lives in one hash with `state` (blob) and `counter` fields;
//! create and compare-and-swap run as Lua scripts so they are atomic on the server.

use crate::store::{ModelStore, StoredModel};
use async_trait::async_trait;
use bandit_core::config::{RedisConfig, StoreConfig};
use bandit_core::{BanditError, BanditResult, ModelKey};
use redis::aio::ConnectionManager;
use redis::Script;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info};

const CREATE_SCRIPT: &str = r#"
if redis.call('EXISTS', KEYS[1]) == 1 then
  return 0
end
redis.call('HSET', KEYS[1], 'state', ARGV[1], 'counter', 0)
return 1
"#;

// Returns {status, counter}: 1 = written (new counter), 0 = conflict
// (current counter), -1 = missing.
const CAS_SCRIPT: &str = r#"
local current = redis.call('HGET', KEYS[1], 'counter')
if not current then
  return {-1, 0}
end
current = tonumber(current)
if current ~= tonumber(ARGV[2]) then
  return {0, current}
end
redis.call('HSET', KEYS[1], 'state', ARGV[1], 'counter', current + 1)
return {1, current + 1}
"#;

/// Redis model store with a bounded per-call timeout.
pub struct RedisModelStore {
    conn: ConnectionManager,
    key_prefix: String,
    timeout: Duration,
    create_script: Script,
    cas_script: Script,
}

impl RedisModelStore {
    /// Connect to the first configured Redis node.
    pub async fn connect(redis: &RedisConfig, store: &StoreConfig) -> anyhow::Result<Self> {
        let url = redis
            .urls
            .first()
            .cloned()
            .unwrap_or_else(|| "redis://localhost:6379".to_string());

        info!(url = %url, "Connecting to Redis");

        let client = redis::Client::open(url.as_str())?;
        let mut conn = tokio::time::timeout(
            Duration::from_millis(redis.connect_timeout_ms),
            client.get_connection_manager(),
        )
        .await
        .map_err(|_| anyhow::anyhow!("timed out connecting to {url}"))??;

        // Verify connectivity
        let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        info!(response = %pong, "Redis connection established");

        Ok(Self {
            conn,
            key_prefix: redis.key_prefix.clone(),
            timeout: Duration::from_millis(store.timeout_ms),
            create_script: Script::new(CREATE_SCRIPT),
            cas_script: Script::new(CAS_SCRIPT),
        })
    }

    // Length-prefixing the name keeps ("a:b", "c") and ("a", "b:c") apart.
    fn redis_key(&self, key: &ModelKey) -> String {
        format!(
            "{}:model:{}:{}:{}",
            self.key_prefix,
            key.name.len(),
            key.name,
            key.version
        )
    }

    async fn bounded<T, F>(&self, op: &'static str, fut: F) -> BanditResult<T>
    where
        F: Future<Output = redis::RedisResult<T>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                metrics::counter!("store.redis.errors").increment(1);
                Err(BanditError::StoreUnavailable(format!("{op}: {e}")))
            }
            Err(_) => {
                metrics::counter!("store.redis.timeouts").increment(1);
                Err(BanditError::StoreUnavailable(format!(
                    "{op}: timed out after {}ms",
                    self.timeout.as_millis()
                )))
            }
        }
    }
}

#[async_trait]
impl ModelStore for RedisModelStore {
    async fn load(&self, key: &ModelKey) -> BanditResult<Option<StoredModel>> {
        let mut conn = self.conn.clone();
        let redis_key = self.redis_key(key);
        let (blob, counter): (Option<Vec<u8>>, Option<u64>) = self
            .bounded(
                "load",
                redis::cmd("HMGET")
                    .arg(&redis_key)
                    .arg("state")
                    .arg("counter")
                    .query_async(&mut conn),
            )
            .await?;

        match (blob, counter) {
            (Some(blob), Some(counter)) => Ok(Some(StoredModel { blob, counter })),
            (None, None) => {
                debug!(model = %key, "Model not present in Redis");
                Ok(None)
            }
            _ => Err(BanditError::CorruptState(format!(
                "{redis_key} is missing its state or counter field"
            ))),
        }
    }

    async fn create_if_absent(&self, key: &ModelKey, blob: Vec<u8>) -> BanditResult<()> {
        let mut conn = self.conn.clone();
        let created: i64 = self
            .bounded(
                "create",
                self.create_script
                    .key(self.redis_key(key))
                    .arg(blob)
                    .invoke_async(&mut conn),
            )
            .await?;

        if created == 1 {
            Ok(())
        } else {
            Err(BanditError::AlreadyExists(key.to_string()))
        }
    }

    async fn conditional_write(
        &self,
        key: &ModelKey,
        blob: Vec<u8>,
        expected: u64,
    ) -> BanditResult<u64> {
        let mut conn = self.conn.clone();
        let (status, counter): (i64, u64) = self
            .bounded(
                "conditional_write",
                self.cas_script
                    .key(self.redis_key(key))
                    .arg(blob)
                    .arg(expected)
                    .invoke_async(&mut conn),
            )
            .await?;

        match status {
            1 => Ok(counter),
            0 => Err(BanditError::VersionConflict {
                model: key.to_string(),
                expected,
                actual: counter,
            }),
            _ => Err(BanditError::NotFound(key.to_string())),
        }
    }
}
