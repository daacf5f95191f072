use crate::error::StorageError;
use crate::record::{NewShortLink, ShortLink};
use async_trait::async_trait;
use jiff::Timestamp;

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Durable storage for short links.
///
/// The store is the only component that enforces uniqueness. Implementations
/// must reject, with [`StorageError::Conflict`]:
///
/// * any insert or update that would duplicate a `code`;
/// * any insert of a system-generated link (`is_custom_alias == false`)
///   whose target address is already held by another system-generated link.
///
/// Custom aliases may share a target with each other and with a system link.
#[async_trait]
pub trait LinkStore: Send + Sync + 'static {
    /// Returns the system-generated link for a target address, if any.
    async fn find_by_target(&self, target: &str) -> Result<Option<ShortLink>>;

    /// Returns the link stored under `code`, if any.
    async fn find_by_code(&self, code: &str) -> Result<Option<ShortLink>>;

    /// Checks whether any link uses `code`.
    async fn exists_by_code(&self, code: &str) -> Result<bool>;

    /// Inserts a new link and returns it with its assigned id and timestamps.
    async fn insert(&self, link: NewShortLink) -> Result<ShortLink>;

    /// Persists a changed code for an existing link and returns the stored row.
    ///
    /// Returns [`StorageError::NotFound`] if no link has `link.id`.
    async fn update(&self, link: ShortLink) -> Result<ShortLink>;

    /// Atomically adds `delta` to the access count of the link with `code`.
    ///
    /// Returns the new count, or `None` if no link uses `code`.
    async fn add_access_count(&self, code: &str, delta: i64) -> Result<Option<i64>>;

    /// Number of stored links.
    async fn count(&self) -> Result<i64>;

    /// Sum of all access counts.
    async fn sum_access_count(&self) -> Result<i64>;

    /// Number of links with a custom alias.
    async fn count_custom_aliases(&self) -> Result<i64>;

    /// Links accessed more than `min_access_count` times, most accessed
    /// first. Ties are ordered by id.
    async fn find_hot_links(&self, min_access_count: i64) -> Result<Vec<ShortLink>>;

    /// Links created within `[start, end]`, oldest first.
    async fn find_created_between(&self, start: Timestamp, end: Timestamp)
        -> Result<Vec<ShortLink>>;
}
