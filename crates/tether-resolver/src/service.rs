use crate::cached::CachedResolver;
use crate::config::ResolverConfig;
use crate::counter::{CounterFlusher, FlusherHandle};
use crate::creation::LinkCreator;
use crate::error::{ResolverError, Result};
use jiff::Timestamp;
use std::sync::Arc;
use tether_core::{KvCache, LinkStore, ShortCode, ShortLink, SystemStats};
use tracing::info;

/// The entry point the boundary layer talks to.
///
/// Composes link creation, the cached read path and the access counter
/// over one store and one cache. Every successful create invalidates the
/// link's cache entry, the cached statistics and the cached hot links.
///
/// Must be constructed inside a Tokio runtime; it spawns the counter
/// flusher. Call [`ResolutionService::shutdown`] before exiting to write
/// out pending hits.
pub struct ResolutionService<S, C> {
    store: Arc<S>,
    creator: LinkCreator<S>,
    resolver: CachedResolver<S, C>,
    flusher: Arc<FlusherHandle>,
}

impl<S, C> Clone for ResolutionService<S, C> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            creator: self.creator.clone(),
            resolver: self.resolver.clone(),
            flusher: Arc::clone(&self.flusher),
        }
    }
}

impl<S: LinkStore, C: KvCache> ResolutionService<S, C> {
    pub fn new(store: S, cache: C) -> Self {
        Self::with_config(store, cache, ResolverConfig::default())
    }

    pub fn with_config(store: S, cache: C, config: ResolverConfig) -> Self {
        let store = Arc::new(store);
        let cache = Arc::new(cache);
        let config = Arc::new(config);

        let (hits, flusher) = CounterFlusher::spawn(Arc::clone(&store), Arc::clone(&cache), &config);
        let creator = LinkCreator::new(Arc::clone(&store), config.alias_policy());
        let resolver = CachedResolver::new(Arc::clone(&store), cache, hits, config);

        Self {
            store,
            creator,
            resolver,
            flusher: Arc::new(flusher),
        }
    }

    /// Creates a link, under `alias` if one is given and non-blank.
    pub async fn create(
        &self,
        target: &str,
        alias: Option<&str>,
        description: Option<String>,
    ) -> Result<ShortLink> {
        match alias.filter(|alias| !alias.trim().is_empty()) {
            Some(alias) => self.create_custom_code(target, alias, description).await,
            None => self.create_system_code(target).await,
        }
    }

    pub async fn create_system_code(&self, target: &str) -> Result<ShortLink> {
        let link = self.creator.create_system_code(target).await?;
        self.after_write(&link).await?;
        Ok(link)
    }

    pub async fn create_custom_code(
        &self,
        target: &str,
        alias: &str,
        description: Option<String>,
    ) -> Result<ShortLink> {
        let link = self
            .creator
            .create_custom_code(target, alias, description)
            .await?;
        self.after_write(&link).await?;
        Ok(link)
    }

    /// Resolves `code` to its target address and records the access.
    pub async fn resolve(&self, code: &str) -> Result<Option<String>> {
        self.resolver.resolve(code).await
    }

    /// Returns the stored record for `code` without recording an access.
    pub async fn get_link_info(&self, code: &str) -> Result<Option<ShortLink>> {
        let code = code.trim();
        if !ShortCode::is_well_formed(code) {
            return Ok(None);
        }
        Ok(self.store.find_by_code(code).await?)
    }

    pub async fn is_available(&self, code: &str) -> Result<bool> {
        self.resolver.is_available(code).await
    }

    pub async fn get_system_stats(&self) -> Result<SystemStats> {
        self.resolver.get_system_stats().await
    }

    /// Links accessed more than `min_access_count` times, most accessed
    /// first. `None` or a negative threshold uses the configured default.
    pub async fn get_hot_links(&self, min_access_count: Option<i64>) -> Result<Vec<ShortLink>> {
        self.resolver.get_hot_links(min_access_count).await
    }

    /// Links created within `[start, end]`, oldest first. Not cached.
    pub async fn get_links_created_between(
        &self,
        start: Timestamp,
        end: Timestamp,
    ) -> Result<Vec<ShortLink>> {
        if start > end {
            return Err(ResolverError::InvalidArgument(format!(
                "start {start} is after end {end}"
            )));
        }
        Ok(self.store.find_created_between(start, end).await?)
    }

    /// Evicts the cached record for `code`, the cached statistics and the
    /// cached hot links.
    pub async fn invalidate(&self, code: &str) -> Result<()> {
        self.resolver.invalidate(code).await?;
        self.resolver.invalidate_stats().await?;
        self.resolver.invalidate_hot_links().await
    }

    /// Writes pending cache-hit counts to the store.
    pub async fn flush_access_counts(&self) {
        self.flusher.flush().await;
    }

    /// Flushes pending hits and stops the counter flusher.
    pub async fn shutdown(&self) {
        self.flusher.shutdown().await;
        info!("Resolution service stopped");
    }

    async fn after_write(&self, link: &ShortLink) -> Result<()> {
        self.invalidate(link.code.as_str()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::CountingStore;
    use jiff::SignedDuration;
    use tether_cache::MokaKvCache;
    use tether_core::codec;

    fn service() -> ResolutionService<CountingStore, MokaKvCache> {
        ResolutionService::new(CountingStore::default(), MokaKvCache::new())
    }

    #[tokio::test]
    async fn create_and_resolve_a_system_code() {
        let service = service();

        let link = service.create("https://example.com/a", None, None).await.unwrap();

        assert_eq!(link.code.as_str(), codec::encode(link.id).unwrap());
        assert_eq!(
            service.resolve(link.code.as_str()).await.unwrap().as_deref(),
            Some("https://example.com/a")
        );
    }

    #[tokio::test]
    async fn blank_alias_means_system_code() {
        let service = service();

        let link = service
            .create("https://example.com/a", Some("   "), None)
            .await
            .unwrap();

        assert!(!link.is_custom_alias);
    }

    #[tokio::test]
    async fn alias_creates_a_custom_code() {
        let service = service();

        let link = service
            .create("https://example.com/a", Some("promo"), Some("spring".into()))
            .await
            .unwrap();

        assert!(link.is_custom_alias);
        assert_eq!(link.code.as_str(), "promo");
        assert!(!service.is_available("promo").await.unwrap());

        let err = service
            .create("https://example.com/b", Some("promo"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ResolverError::Conflict(_)));
    }

    #[tokio::test]
    async fn creating_a_link_invalidates_stats() {
        let service = service();
        service.create("https://a.example", None, None).await.unwrap();

        let before = service.get_system_stats().await.unwrap();
        service.create("https://b.example", Some("bee"), None).await.unwrap();
        let after = service.get_system_stats().await.unwrap();

        assert_eq!(before.total_links, 1);
        assert_eq!(after.total_links, 2);
        assert_eq!(after.custom_aliases, 1);
    }

    #[tokio::test]
    async fn link_info_does_not_count() {
        let service = service();
        let link = service.create("https://example.com", None, None).await.unwrap();

        let info = service.get_link_info(link.code.as_str()).await.unwrap().unwrap();
        service.get_link_info(link.code.as_str()).await.unwrap();

        assert_eq!(info.access_count, 0);
        assert_eq!(service.get_system_stats().await.unwrap().total_access, 0);
        assert!(service.get_link_info("missing").await.unwrap().is_none());
        assert!(service.get_link_info("~1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn three_resolutions_are_counted() {
        let service = service();
        let link = service.create("https://example.com/a", None, None).await.unwrap();
        let code = link.code.as_str();

        for _ in 0..3 {
            assert!(service.resolve(code).await.unwrap().is_some());
        }
        service.flush_access_counts().await;

        let info = service.get_link_info(code).await.unwrap().unwrap();
        assert_eq!(info.access_count, 3);
    }

    #[tokio::test]
    async fn invalidate_evicts_link_and_stats() {
        let store = CountingStore::default();
        let service = ResolutionService::new(store.clone(), MokaKvCache::new());
        let link = service.create("https://example.com", None, None).await.unwrap();

        service.resolve(link.code.as_str()).await.unwrap();
        service.resolve(link.code.as_str()).await.unwrap();
        assert_eq!(store.code_lookups(), 1);

        service.invalidate(link.code.as_str()).await.unwrap();
        service.resolve(link.code.as_str()).await.unwrap();
        assert_eq!(store.code_lookups(), 2);
    }

    #[tokio::test]
    async fn creating_a_link_evicts_hot_links() {
        let store = CountingStore::default();
        let service = ResolutionService::new(store.clone(), MokaKvCache::new());
        let first = service.create("https://a.example", None, None).await.unwrap();
        store.inner.add_access_count(first.code.as_str(), 30).await.unwrap();

        assert_eq!(service.get_hot_links(None).await.unwrap().len(), 1);
        assert_eq!(service.get_hot_links(None).await.unwrap().len(), 1);
        assert_eq!(store.hot_link_queries(), 1);

        let second = service.create("https://b.example", Some("bee"), None).await.unwrap();
        store.inner.add_access_count(second.code.as_str(), 60).await.unwrap();

        let hot = service.get_hot_links(None).await.unwrap();
        assert_eq!(store.hot_link_queries(), 2);
        assert_eq!(hot[0].code.as_str(), "bee");
        assert_eq!(hot[1].code, first.code);
    }

    #[tokio::test]
    async fn invalidate_evicts_hot_links() {
        let store = CountingStore::default();
        let service = ResolutionService::new(store.clone(), MokaKvCache::new());
        let link = service.create("https://example.com", None, None).await.unwrap();

        assert!(service.get_hot_links(Some(5)).await.unwrap().is_empty());
        store.inner.add_access_count(link.code.as_str(), 6).await.unwrap();
        assert!(service.get_hot_links(Some(5)).await.unwrap().is_empty());

        service.invalidate(link.code.as_str()).await.unwrap();
        assert_eq!(service.get_hot_links(Some(5)).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn links_created_between() {
        let service = service();
        let before = Timestamp::now();
        let a = service.create("https://a.example", None, None).await.unwrap();
        let b = service.create("https://b.example", None, None).await.unwrap();
        let after = Timestamp::now() + SignedDuration::from_secs(1);

        let links = service.get_links_created_between(before, after).await.unwrap();
        let codes: Vec<_> = links.iter().map(|l| l.code.clone()).collect();
        assert_eq!(codes, [a.code, b.code]);

        let earlier = before - SignedDuration::from_hours(1);
        let none = service
            .get_links_created_between(earlier, earlier)
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn inverted_creation_window_is_rejected() {
        let service = service();
        let now = Timestamp::now();

        let err = service
            .get_links_created_between(now, now - SignedDuration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, ResolverError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn shutdown_writes_pending_hits() {
        let store = CountingStore::default();
        let service = ResolutionService::new(store.clone(), MokaKvCache::new());
        let link = service.create("https://example.com", None, None).await.unwrap();

        service.resolve(link.code.as_str()).await.unwrap();
        service.resolve(link.code.as_str()).await.unwrap();
        service.shutdown().await;

        let stored = store.inner.find_by_code(link.code.as_str()).await.unwrap().unwrap();
        assert_eq!(stored.access_count, 2);
    }
}
