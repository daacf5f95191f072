use crate::config::ResolverConfig;
use crate::counter::HitRecorder;
use crate::error::Result;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tether_core::{CacheError, KvCache, LinkStore, ShortCode, ShortLink, SystemStats};
use tracing::{debug, trace, warn};

pub const LINK_KEY_PREFIX: &str = "shortlink:";
pub const ACCESS_COUNT_KEY_PREFIX: &str = "access_count:";
pub const STATS_KEY: &str = "stats:system";
pub const HOT_LINKS_KEY_PREFIX: &str = "hotlinks:";
/// Bumped to evict every cached hot-link list at once; lists are keyed by
/// the generation they were computed in.
pub const HOT_LINKS_GENERATION_KEY: &str = "hotlinks:generation";

pub fn link_key(code: &str) -> String {
    format!("{LINK_KEY_PREFIX}{code}")
}

pub fn access_count_key(code: &str) -> String {
    format!("{ACCESS_COUNT_KEY_PREFIX}{code}")
}

pub fn hot_links_key(generation: i64, min_access_count: i64) -> String {
    format!("{HOT_LINKS_KEY_PREFIX}{generation}:{min_access_count}")
}

/// Cache-aside read path over a [`LinkStore`].
///
/// Link records are cached under `shortlink:<code>` as JSON with a jittered
/// TTL, so entries primed together do not expire together. Misses are not
/// cached. A store-path resolution writes its hit to the store directly; a
/// cache hit hands it to the [`HitRecorder`] and returns without waiting.
pub struct CachedResolver<S, C> {
    store: Arc<S>,
    cache: Arc<C>,
    hits: HitRecorder,
    config: Arc<ResolverConfig>,
}

impl<S, C> Clone for CachedResolver<S, C> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            cache: Arc::clone(&self.cache),
            hits: self.hits.clone(),
            config: Arc::clone(&self.config),
        }
    }
}

impl<S: LinkStore, C: KvCache> CachedResolver<S, C> {
    pub fn new(store: Arc<S>, cache: Arc<C>, hits: HitRecorder, config: Arc<ResolverConfig>) -> Self {
        Self {
            store,
            cache,
            hits,
            config,
        }
    }

    /// Resolves `code` to its target address and records the access.
    ///
    /// Returns `Ok(None)` for blank, malformed or unknown codes.
    pub async fn resolve(&self, code: &str) -> Result<Option<String>> {
        let code = code.trim();
        if !ShortCode::is_well_formed(code) {
            trace!(code, "Rejecting malformed short code");
            return Ok(None);
        }

        let key = link_key(code);
        if let Some(link) = self.cached::<ShortLink>(&key).await? {
            trace!(code, "Resolved short code from cache");
            self.hits.record(code);
            return Ok(Some(link.target_address));
        }

        let Some(mut link) = self.store.find_by_code(code).await? else {
            trace!(code, "Short code not found");
            return Ok(None);
        };

        if let Some(count) = self.store.add_access_count(code, 1).await? {
            link.access_count = count;
        }
        self.prime(&link).await?;
        debug!(code, "Resolved short code from store");

        Ok(Some(link.target_address))
    }

    /// Writes `link` to the cache with a fresh jittered TTL.
    pub async fn prime(&self, link: &ShortLink) -> Result<()> {
        let bytes = serde_json::to_vec(link)
            .map_err(|e| CacheError::Serialization(format!("failed to encode link: {e}")))?;
        let ttl = self.config.jittered_ttl();
        self.cache
            .set_with_ttl(&link_key(link.code.as_str()), &bytes, ttl)
            .await?;
        Ok(())
    }

    /// Drops the cached record for `code`.
    pub async fn invalidate(&self, code: &str) -> Result<()> {
        self.cache.del(&link_key(code.trim())).await?;
        trace!(code, "Invalidated cached short link");
        Ok(())
    }

    /// Drops the cached aggregate statistics.
    pub async fn invalidate_stats(&self) -> Result<()> {
        self.cache.del(STATS_KEY).await?;
        Ok(())
    }

    /// Returns the aggregate statistics, cached for `stats_ttl`.
    pub async fn get_system_stats(&self) -> Result<SystemStats> {
        if let Some(stats) = self.cached::<SystemStats>(STATS_KEY).await? {
            return Ok(stats);
        }

        let stats = SystemStats {
            total_links: self.store.count().await?,
            total_access: self.store.sum_access_count().await?,
            custom_aliases: self.store.count_custom_aliases().await?,
        };

        let bytes = serde_json::to_vec(&stats)
            .map_err(|e| CacheError::Serialization(format!("failed to encode stats: {e}")))?;
        self.cache
            .set_with_ttl(STATS_KEY, &bytes, self.config.stats_ttl)
            .await?;
        debug!(?stats, "Computed system statistics");

        Ok(stats)
    }

    /// Returns links accessed more than the threshold, most accessed first,
    /// cached for `hot_links_ttl`.
    ///
    /// A missing or negative `min_access_count` uses the configured default.
    pub async fn get_hot_links(&self, min_access_count: Option<i64>) -> Result<Vec<ShortLink>> {
        let threshold = self.config.hot_link_threshold(min_access_count);
        let key = hot_links_key(self.hot_links_generation().await?, threshold);

        if let Some(links) = self.cached::<Vec<ShortLink>>(&key).await? {
            trace!(threshold, "Hot links served from cache");
            return Ok(links);
        }

        let links = self.store.find_hot_links(threshold).await?;
        let bytes = serde_json::to_vec(&links)
            .map_err(|e| CacheError::Serialization(format!("failed to encode hot links: {e}")))?;
        self.cache
            .set_with_ttl(&key, &bytes, self.config.hot_links_ttl)
            .await?;
        debug!(threshold, count = links.len(), "Computed hot links");

        Ok(links)
    }

    /// Drops every cached hot-link list.
    pub async fn invalidate_hot_links(&self) -> Result<()> {
        let generation = self.cache.incr(HOT_LINKS_GENERATION_KEY).await?;
        trace!(generation, "Invalidated cached hot links");
        Ok(())
    }

    async fn hot_links_generation(&self) -> Result<i64> {
        let Some(bytes) = self.cache.get(HOT_LINKS_GENERATION_KEY).await? else {
            return Ok(0);
        };
        std::str::from_utf8(&bytes)
            .ok()
            .and_then(|value| value.parse().ok())
            .ok_or_else(|| {
                CacheError::InvalidData(format!("'{HOT_LINKS_GENERATION_KEY}' is not an integer"))
                    .into()
            })
    }

    /// Returns `true` if no link uses `code`.
    ///
    /// Malformed codes are never available. A cached record counts as taken
    /// without consulting the store.
    pub async fn is_available(&self, code: &str) -> Result<bool> {
        let code = code.trim();
        if !ShortCode::is_well_formed(code) {
            return Ok(false);
        }
        if self.cache.exists(&link_key(code)).await? {
            return Ok(false);
        }
        Ok(!self.store.exists_by_code(code).await?)
    }

    /// Reads and decodes a cached JSON value. An entry that no longer
    /// decodes is deleted and reported as a miss.
    async fn cached<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let Some(bytes) = self.cache.get(key).await? else {
            return Ok(None);
        };

        match serde_json::from_slice(&bytes) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                warn!(key, error = %e, "Discarding undecodable cache entry");
                self.cache.del(key).await?;
                Ok(None)
            }
        }
    }
}
