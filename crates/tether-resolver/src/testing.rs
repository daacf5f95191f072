use async_trait::async_trait;
use jiff::Timestamp;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tether_core::store::Result;
use tether_core::{LinkStore, NewShortLink, ShortCode, ShortLink};
use tether_storage::InMemoryStore;

/// Inserts a custom link straight into the store.
pub async fn link<S: LinkStore>(store: &S, code: &str, target: &str) -> ShortLink {
    store
        .insert(NewShortLink::custom(target, ShortCode::new_unchecked(code), None))
        .await
        .unwrap()
}

/// An [`InMemoryStore`] that counts code lookups.
#[derive(Debug, Clone, Default)]
pub struct CountingStore {
    pub inner: InMemoryStore,
    code_lookups: Arc<AtomicUsize>,
    hot_link_queries: Arc<AtomicUsize>,
}

impl CountingStore {
    pub fn code_lookups(&self) -> usize {
        self.code_lookups.load(Ordering::SeqCst)
    }

    pub fn hot_link_queries(&self) -> usize {
        self.hot_link_queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LinkStore for CountingStore {
    async fn find_by_target(&self, target: &str) -> Result<Option<ShortLink>> {
        self.inner.find_by_target(target).await
    }

    async fn find_by_code(&self, code: &str) -> Result<Option<ShortLink>> {
        self.code_lookups.fetch_add(1, Ordering::SeqCst);
        self.inner.find_by_code(code).await
    }

    async fn exists_by_code(&self, code: &str) -> Result<bool> {
        self.code_lookups.fetch_add(1, Ordering::SeqCst);
        self.inner.exists_by_code(code).await
    }

    async fn insert(&self, link: NewShortLink) -> Result<ShortLink> {
        self.inner.insert(link).await
    }

    async fn update(&self, link: ShortLink) -> Result<ShortLink> {
        self.inner.update(link).await
    }

    async fn add_access_count(&self, code: &str, delta: i64) -> Result<Option<i64>> {
        self.inner.add_access_count(code, delta).await
    }

    async fn count(&self) -> Result<i64> {
        self.inner.count().await
    }

    async fn sum_access_count(&self) -> Result<i64> {
        self.inner.sum_access_count().await
    }

    async fn count_custom_aliases(&self) -> Result<i64> {
        self.inner.count_custom_aliases().await
    }

    async fn find_hot_links(&self, min_access_count: i64) -> Result<Vec<ShortLink>> {
        self.hot_link_queries.fetch_add(1, Ordering::SeqCst);
        self.inner.find_hot_links(min_access_count).await
    }

    async fn find_created_between(
        &self,
        start: Timestamp,
        end: Timestamp,
    ) -> Result<Vec<ShortLink>> {
        self.inner.find_created_between(start, end).await
    }
}

/// Hides committed rows from the checks that precede an insert, the way a
/// concurrent creator committing between check and insert would.
///
/// The first `stale_target_reads` calls to `find_by_target` miss and
/// `exists_by_code` always reports a free code. The store's own unique
/// indexes still apply.
#[derive(Debug, Default)]
pub struct StaleReadStore {
    pub inner: InMemoryStore,
    stale_target_reads: AtomicUsize,
}

impl StaleReadStore {
    pub fn new(inner: InMemoryStore, stale_target_reads: usize) -> Self {
        Self {
            inner,
            stale_target_reads: AtomicUsize::new(stale_target_reads),
        }
    }
}

#[async_trait]
impl LinkStore for StaleReadStore {
    async fn find_by_target(&self, target: &str) -> Result<Option<ShortLink>> {
        let stale = self
            .stale_target_reads
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if stale {
            return Ok(None);
        }
        self.inner.find_by_target(target).await
    }

    async fn find_by_code(&self, code: &str) -> Result<Option<ShortLink>> {
        self.inner.find_by_code(code).await
    }

    async fn exists_by_code(&self, _code: &str) -> Result<bool> {
        Ok(false)
    }

    async fn insert(&self, link: NewShortLink) -> Result<ShortLink> {
        self.inner.insert(link).await
    }

    async fn update(&self, link: ShortLink) -> Result<ShortLink> {
        self.inner.update(link).await
    }

    async fn add_access_count(&self, code: &str, delta: i64) -> Result<Option<i64>> {
        self.inner.add_access_count(code, delta).await
    }

    async fn count(&self) -> Result<i64> {
        self.inner.count().await
    }

    async fn sum_access_count(&self) -> Result<i64> {
        self.inner.sum_access_count().await
    }

    async fn count_custom_aliases(&self) -> Result<i64> {
        self.inner.count_custom_aliases().await
    }

    async fn find_hot_links(&self, min_access_count: i64) -> Result<Vec<ShortLink>> {
        self.inner.find_hot_links(min_access_count).await
    }

    async fn find_created_between(
        &self,
        start: Timestamp,
        end: Timestamp,
    ) -> Result<Vec<ShortLink>> {
        self.inner.find_created_between(start, end).await
    }
}
