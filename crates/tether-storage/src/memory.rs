use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use jiff::Timestamp;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tether_core::store::{LinkStore, Result};
use tether_core::{ConflictKey, NewShortLink, ShortLink, StorageError};

#[derive(Debug)]
struct Tables {
    links: DashMap<i64, ShortLink>,
    /// Unique index: code -> id.
    codes: DashMap<String, i64>,
    /// Unique index over system-generated links: target -> id.
    targets: DashMap<String, i64>,
    next_id: AtomicI64,
}

/// In-memory implementation of [`LinkStore`] using DashMap.
///
/// DashMap provides better concurrency than RwLock<HashMap> because it
/// uses sharded locks. The unique indexes are claimed with entry-level
/// atomicity, so concurrent writers race on the index exactly as they would
/// on a relational unique key. Clones share the same tables.
#[derive(Debug, Clone)]
pub struct InMemoryStore {
    tables: Arc<Tables>,
}

impl InMemoryStore {
    /// Creates a new, empty in-memory store. Ids start at 1.
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Creates a new in-memory store with the specified capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            tables: Arc::new(Tables {
                links: DashMap::with_capacity(capacity),
                codes: DashMap::with_capacity(capacity),
                targets: DashMap::with_capacity(capacity),
                next_id: AtomicI64::new(1),
            }),
        }
    }

    fn link_by_id(&self, id: i64) -> Option<ShortLink> {
        self.tables.links.get(&id).map(|link| link.clone())
    }

    fn claim_code(&self, code: &str, id: i64) -> Result<()> {
        match self.tables.codes.entry(code.to_owned()) {
            Entry::Occupied(owner) if *owner.get() == id => Ok(()),
            Entry::Occupied(_) => Err(StorageError::Conflict {
                key: ConflictKey::Code,
                value: code.to_owned(),
            }),
            Entry::Vacant(slot) => {
                slot.insert(id);
                Ok(())
            }
        }
    }

    fn release_code(&self, code: &str, id: i64) {
        self.tables.codes.remove_if(code, |_, owner| *owner == id);
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LinkStore for InMemoryStore {
    async fn find_by_target(&self, target: &str) -> Result<Option<ShortLink>> {
        let Some(id) = self.tables.targets.get(target).map(|id| *id) else {
            return Ok(None);
        };
        Ok(self.link_by_id(id))
    }

    async fn find_by_code(&self, code: &str) -> Result<Option<ShortLink>> {
        let Some(id) = self.tables.codes.get(code).map(|id| *id) else {
            return Ok(None);
        };
        // A claimed code without a row is an insert still in flight.
        Ok(self.link_by_id(id))
    }

    async fn exists_by_code(&self, code: &str) -> Result<bool> {
        Ok(self.tables.codes.contains_key(code))
    }

    async fn insert(&self, link: NewShortLink) -> Result<ShortLink> {
        let id = self.tables.next_id.fetch_add(1, Ordering::SeqCst);

        self.claim_code(link.code.as_str(), id)?;

        if link.is_custom_alias {
            let stored = link.into_link(id, Timestamp::now());
            self.tables.links.insert(id, stored.clone());
            return Ok(stored);
        }

        match self.tables.targets.entry(link.target_address.clone()) {
            Entry::Occupied(_) => {
                self.release_code(link.code.as_str(), id);
                Err(StorageError::Conflict {
                    key: ConflictKey::Target,
                    value: link.target_address,
                })
            }
            Entry::Vacant(slot) => {
                // the row is written while the target is locked, so a
                // target lookup never sees the index without the row
                let stored = link.into_link(id, Timestamp::now());
                self.tables.links.insert(id, stored.clone());
                slot.insert(id);
                Ok(stored)
            }
        }
    }

    async fn update(&self, link: ShortLink) -> Result<ShortLink> {
        let Some(current) = self.link_by_id(link.id) else {
            return Err(StorageError::NotFound(link.id));
        };

        if current.code != link.code {
            self.claim_code(link.code.as_str(), link.id)?;
        }

        let updated = {
            let Some(mut row) = self.tables.links.get_mut(&link.id) else {
                self.release_code(link.code.as_str(), link.id);
                return Err(StorageError::NotFound(link.id));
            };
            row.code = link.code;
            row.last_updated_at = Timestamp::now();
            row.clone()
        };

        if current.code != updated.code {
            self.release_code(current.code.as_str(), link.id);
        }

        Ok(updated)
    }

    async fn add_access_count(&self, code: &str, delta: i64) -> Result<Option<i64>> {
        let Some(id) = self.tables.codes.get(code).map(|id| *id) else {
            return Ok(None);
        };
        let Some(mut row) = self.tables.links.get_mut(&id) else {
            return Ok(None);
        };
        row.access_count = row.access_count.saturating_add(delta);
        row.last_updated_at = Timestamp::now();
        Ok(Some(row.access_count))
    }

    async fn count(&self) -> Result<i64> {
        Ok(self.tables.links.len() as i64)
    }

    async fn sum_access_count(&self) -> Result<i64> {
        Ok(self
            .tables
            .links
            .iter()
            .fold(0i64, |total, link| total.saturating_add(link.access_count)))
    }

    async fn count_custom_aliases(&self) -> Result<i64> {
        Ok(self
            .tables
            .links
            .iter()
            .filter(|link| link.is_custom_alias)
            .count() as i64)
    }

    async fn find_hot_links(&self, min_access_count: i64) -> Result<Vec<ShortLink>> {
        let mut links: Vec<ShortLink> = self
            .tables
            .links
            .iter()
            .filter(|link| link.access_count > min_access_count)
            .map(|link| link.clone())
            .collect();
        links.sort_by(|a, b| b.access_count.cmp(&a.access_count).then(a.id.cmp(&b.id)));
        Ok(links)
    }

    async fn find_created_between(
        &self,
        start: Timestamp,
        end: Timestamp,
    ) -> Result<Vec<ShortLink>> {
        let mut links: Vec<ShortLink> = self
            .tables
            .links
            .iter()
            .filter(|link| link.created_at >= start && link.created_at <= end)
            .map(|link| link.clone())
            .collect();
        links.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(links)
    }
}
