use crate::error::CacheError;
use async_trait::async_trait;
use std::time::Duration;

/// Result type for cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;

/// A shared key/value cache with per-key expiry.
///
/// This is the primitive surface the resolver builds its cache-aside logic
/// on. Implementations can use Redis, an in-memory cache, or anything with
/// equivalent semantics. The cache is never authoritative.
#[async_trait]
pub trait KvCache: Send + Sync + 'static {
    /// Get the raw value for `key`.
    ///
    /// Returns `Ok(None)` if the key is not in the cache.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Store `value` under `key`, expiring after `ttl`.
    async fn set_with_ttl(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()>;

    /// Remove `key`. It is not an error if the key does not exist.
    async fn del(&self, key: &str) -> Result<()>;

    /// Increment the integer at `key` by one and return the new value.
    ///
    /// A missing key starts from zero and is created without expiry; an
    /// existing key keeps its expiry.
    async fn incr(&self, key: &str) -> Result<i64>;

    /// Set the expiry of an existing key. Returns `false` if the key is absent.
    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool>;

    /// Checks whether `key` is present.
    async fn exists(&self, key: &str) -> Result<bool>;
}
