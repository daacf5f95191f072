use async_trait::async_trait;
use redis::AsyncCommands;
use std::time::Duration;
use tether_core::cache::{KvCache, Result};
use tether_core::CacheError;
use tracing::{debug, trace, warn};

const DEFAULT_KEY_PREFIX: &str = "tether:";

/// A Redis-based implementation of [`KvCache`].
///
/// All keys are namespaced with a configurable prefix. Expiries are sent
/// with millisecond precision (`PSETEX` / `PEXPIRE`).
#[derive(Debug, Clone)]
pub struct RedisKvCache {
    conn: redis::aio::MultiplexedConnection,
    key_prefix: String,
}

fn map_redis_error(operation: &str, err: redis::RedisError) -> CacheError {
    let message = format!("{operation}: {err}");
    if message.to_ascii_lowercase().contains("timed out") {
        CacheError::Timeout(message)
    } else if err.is_io_error() {
        CacheError::Unavailable(message)
    } else {
        CacheError::Operation(message)
    }
}

fn ttl_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}

impl RedisKvCache {
    /// Creates a new Redis cache using the default `tether:` key prefix.
    pub fn new(conn: redis::aio::MultiplexedConnection) -> Self {
        Self::with_prefix(conn, DEFAULT_KEY_PREFIX)
    }

    /// Creates a new Redis cache with a custom key prefix.
    ///
    /// # Arguments
    ///
    /// * `conn` - A multiplexed Redis connection
    /// * `key_prefix` - Custom prefix for cache keys (e.g., "myapp:")
    pub fn with_prefix(
        conn: redis::aio::MultiplexedConnection,
        key_prefix: impl Into<String>,
    ) -> Self {
        Self {
            conn,
            key_prefix: key_prefix.into(),
        }
    }

    /// Opens a multiplexed connection to `url` and wraps it.
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)
            .map_err(|e| CacheError::Unavailable(format!("invalid redis url: {e}")))?;
        let conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| map_redis_error("failed to connect to Redis", e))?;
        Ok(Self::new(conn))
    }

    fn namespaced(&self, key: &str) -> String {
        format!("{}{}", self.key_prefix, key)
    }
}

#[async_trait]
impl KvCache for RedisKvCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let full_key = self.namespaced(key);
        let mut conn = self.conn.clone();

        match conn.get::<_, Option<Vec<u8>>>(&full_key).await {
            Ok(value) => {
                trace!(key, hit = value.is_some(), "Fetched value from Redis");
                Ok(value)
            }
            Err(e) => {
                warn!(key, error = %e, "Redis error on get");
                Err(map_redis_error("failed to fetch value from Redis", e))
            }
        }
    }

    async fn set_with_ttl(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()> {
        let full_key = self.namespaced(key);
        let mut conn = self.conn.clone();

        match conn
            .pset_ex::<_, _, ()>(&full_key, value, ttl_millis(ttl))
            .await
        {
            Ok(()) => {
                debug!(key, ttl_secs = ttl.as_secs(), "Stored value in Redis");
                Ok(())
            }
            Err(e) => {
                warn!(key, error = %e, "Failed to store value in Redis");
                Err(map_redis_error("failed to write value to Redis", e))
            }
        }
    }

    async fn del(&self, key: &str) -> Result<()> {
        let full_key = self.namespaced(key);
        let mut conn = self.conn.clone();

        conn.del::<_, ()>(&full_key).await.map_err(|e| {
            warn!(key, error = %e, "Failed to remove value from Redis");
            map_redis_error("failed to delete value from Redis", e)
        })
    }

    async fn incr(&self, key: &str) -> Result<i64> {
        let full_key = self.namespaced(key);
        let mut conn = self.conn.clone();

        conn.incr::<_, _, i64>(&full_key, 1)
            .await
            .map_err(|e| map_redis_error("failed to increment counter in Redis", e))
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool> {
        let full_key = self.namespaced(key);
        let mut conn = self.conn.clone();
        let millis = i64::try_from(ttl_millis(ttl)).unwrap_or(i64::MAX);

        conn.pexpire::<_, bool>(&full_key, millis)
            .await
            .map_err(|e| map_redis_error("failed to set expiry in Redis", e))
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let full_key = self.namespaced(key);
        let mut conn = self.conn.clone();

        conn.exists::<_, bool>(&full_key)
            .await
            .map_err(|e| map_redis_error("failed to check key in Redis", e))
    }
}
