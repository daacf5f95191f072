use async_trait::async_trait;
use moka::future::Cache;
use moka::ops::compute::{CompResult, Op};
use moka::Expiry;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tether_core::cache::{KvCache, Result};
use tether_core::CacheError;
use tracing::{debug, trace};
use typed_builder::TypedBuilder;

const DEFAULT_MAX_CAPACITY: u64 = 10_000;

/// How a write changes the expiry of the entry it stores.
#[derive(Debug, Clone, Copy)]
enum Expiration {
    Never,
    After(Duration),
    /// Keep whatever expiry the entry had before the write.
    Keep,
}

#[derive(Debug, Clone)]
struct Slot {
    value: Arc<[u8]>,
    expiration: Expiration,
}

impl Slot {
    fn counter(value: i64, expiration: Expiration) -> Self {
        Self {
            value: Arc::from(value.to_string().into_bytes()),
            expiration,
        }
    }

    fn as_counter(&self) -> Option<i64> {
        std::str::from_utf8(&self.value).ok()?.parse().ok()
    }
}

/// Per-entry expiry driven by the [`Expiration`] each write carries.
struct SlotExpiry;

impl Expiry<String, Slot> for SlotExpiry {
    fn expire_after_create(&self, _key: &String, slot: &Slot, _created_at: Instant) -> Option<Duration> {
        match slot.expiration {
            Expiration::After(ttl) => Some(ttl),
            Expiration::Never | Expiration::Keep => None,
        }
    }

    fn expire_after_update(
        &self,
        _key: &String,
        slot: &Slot,
        _updated_at: Instant,
        duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        match slot.expiration {
            Expiration::After(ttl) => Some(ttl),
            Expiration::Never => None,
            Expiration::Keep => duration_until_expiry,
        }
    }
}

/// An in-memory [`KvCache`] using Moka.
///
/// Every entry carries its own TTL, so jittered link entries, short-lived
/// counters and the stats entry can share one cache. Counters are stored as
/// decimal strings, as Redis does, and updated with Moka's per-key compute
/// so concurrent increments never lose updates. Suited to single-node
/// deployments and tests.
#[derive(Clone)]
pub struct MokaKvCache {
    cache: Cache<String, Slot>,
}

impl std::fmt::Debug for MokaKvCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MokaKvCache")
            .field("entries", &self.cache.entry_count())
            .finish()
    }
}

impl MokaKvCache {
    /// Creates a new Moka cache holding at most 10,000 entries.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_CAPACITY)
    }

    /// Creates a new Moka cache with a custom maximum capacity.
    pub fn with_capacity(max_capacity: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_capacity)
            .expire_after(SlotExpiry)
            .build();
        Self { cache }
    }

    /// Returns a builder for creating a custom cache configuration.
    pub fn builder() -> CacheConfigBuilder {
        CacheConfig::builder()
    }
}

impl Default for MokaKvCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KvCache for MokaKvCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        match self.cache.get(key).await {
            Some(slot) => {
                trace!(key, "Cache hit in Moka");
                Ok(Some(slot.value.to_vec()))
            }
            None => {
                trace!(key, "Cache miss in Moka");
                Ok(None)
            }
        }
    }

    async fn set_with_ttl(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()> {
        let slot = Slot {
            value: Arc::from(value),
            expiration: Expiration::After(ttl),
        };
        self.cache.insert(key.to_owned(), slot).await;
        debug!(key, ttl_secs = ttl.as_secs(), "Stored value in Moka");
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<()> {
        self.cache.invalidate(key).await;
        trace!(key, "Removed value from Moka (if present)");
        Ok(())
    }

    async fn incr(&self, key: &str) -> Result<i64> {
        let result = self
            .cache
            .entry(key.to_owned())
            .and_compute_with(|current| async move {
                match current.map(|entry| entry.into_value()) {
                    None => Op::Put(Slot::counter(1, Expiration::Never)),
                    Some(slot) => match slot.as_counter().and_then(|n| n.checked_add(1)) {
                        Some(next) => Op::Put(Slot::counter(next, Expiration::Keep)),
                        None => Op::Nop,
                    },
                }
            })
            .await;

        match result {
            CompResult::Inserted(entry) | CompResult::ReplacedWith(entry) => {
                entry.value().as_counter().ok_or_else(|| {
                    CacheError::InvalidData(format!("counter '{key}' is not an integer"))
                })
            }
            _ => Err(CacheError::InvalidData(format!(
                "value at '{key}' is not an incrementable integer"
            ))),
        }
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool> {
        let result = self
            .cache
            .entry(key.to_owned())
            .and_compute_with(|current| async move {
                match current {
                    Some(entry) => Op::Put(Slot {
                        value: entry.into_value().value,
                        expiration: Expiration::After(ttl),
                    }),
                    None => Op::Nop,
                }
            })
            .await;

        Ok(matches!(result, CompResult::ReplacedWith(_)))
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.cache.get(key).await.is_some())
    }
}

/// Configuration for creating a [`MokaKvCache`] with custom settings.
#[derive(Debug, TypedBuilder, Default)]
pub struct CacheConfig {
    /// Maximum number of entries the cache can hold.
    #[builder(default, setter(strip_option))]
    max_capacity: Option<u64>,
}

impl From<CacheConfig> for MokaKvCache {
    fn from(config: CacheConfig) -> Self {
        MokaKvCache::with_capacity(config.max_capacity.unwrap_or(DEFAULT_MAX_CAPACITY))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOUR: Duration = Duration::from_secs(3600);

    #[tokio::test]
    async fn get_and_set() {
        let cache = MokaKvCache::new();

        assert!(cache.get("k").await.unwrap().is_none());
        cache.set_with_ttl("k", b"value", HOUR).await.unwrap();

        assert_eq!(cache.get("k").await.unwrap(), Some(b"value".to_vec()));
        assert!(cache.exists("k").await.unwrap());
    }

    #[tokio::test]
    async fn del_is_idempotent() {
        let cache = MokaKvCache::new();
        cache.set_with_ttl("k", b"value", HOUR).await.unwrap();

        cache.del("k").await.unwrap();
        cache.del("k").await.unwrap();

        assert!(!cache.exists("k").await.unwrap());
    }

    #[tokio::test]
    async fn entries_expire_after_their_own_ttl() {
        let cache = MokaKvCache::new();
        cache
            .set_with_ttl("short", b"a", Duration::from_millis(50))
            .await
            .unwrap();
        cache.set_with_ttl("long", b"b", HOUR).await.unwrap();

        tokio::time::sleep(Duration::from_millis(120)).await;

        assert!(cache.get("short").await.unwrap().is_none());
        assert!(cache.get("long").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn incr_creates_and_counts() {
        let cache = MokaKvCache::new();

        assert_eq!(cache.incr("hits").await.unwrap(), 1);
        assert_eq!(cache.incr("hits").await.unwrap(), 2);
        assert_eq!(cache.incr("hits").await.unwrap(), 3);
        assert_eq!(cache.get("hits").await.unwrap(), Some(b"3".to_vec()));
    }

    #[tokio::test]
    async fn incr_rejects_non_integers() {
        let cache = MokaKvCache::new();
        cache.set_with_ttl("text", b"hello", HOUR).await.unwrap();

        let err = cache.incr("text").await.unwrap_err();
        assert!(matches!(err, CacheError::InvalidData(_)));
        assert_eq!(cache.get("text").await.unwrap(), Some(b"hello".to_vec()));
    }

    #[tokio::test]
    async fn incr_keeps_expiry() {
        let cache = MokaKvCache::new();
        cache.incr("hits").await.unwrap();
        assert!(cache.expire("hits", Duration::from_millis(80)).await.unwrap());

        cache.incr("hits").await.unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;

        assert!(!cache.exists("hits").await.unwrap());
        // an expired counter starts over
        assert_eq!(cache.incr("hits").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn expire_missing_key() {
        let cache = MokaKvCache::new();
        assert!(!cache.expire("nope", HOUR).await.unwrap());
        assert!(!cache.exists("nope").await.unwrap());
    }

    #[tokio::test]
    async fn concurrent_increments_are_not_lost() {
        let cache = MokaKvCache::new();
        let mut handles = vec![];

        for _ in 0..50 {
            let cache = cache.clone();
            handles.push(tokio::spawn(async move { cache.incr("hits").await }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(cache.get("hits").await.unwrap(), Some(b"50".to_vec()));
    }

    #[tokio::test]
    async fn builder_pattern() {
        let cache: MokaKvCache = MokaKvCache::builder().max_capacity(100).build().into();

        cache.set_with_ttl("k", b"v", HOUR).await.unwrap();
        assert!(cache.exists("k").await.unwrap());
    }
}
