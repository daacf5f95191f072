use async_trait::async_trait;
use jiff::Timestamp;
use sqlx::mysql::MySqlRow;
use sqlx::{MySqlPool, Row};
use tether_core::store::{LinkStore, Result};
use tether_core::{ConflictKey, NewShortLink, ShortCode, ShortLink, StorageError};

/// Name of the unique index over system-generated targets, see
/// `ddl/mysql/short_links.sql`.
const SYSTEM_TARGET_INDEX: &str = "uk_short_links_system_target";

macro_rules! select_links {
    ($($tail:literal),*) => {
        concat!(
            "SELECT id, target_address, short_code, is_custom_alias, access_count, ",
            "description, created_at, last_updated_at FROM short_links ",
            $($tail),*
        )
    };
}

/// MySQL implementation of the [`LinkStore`] contract.
///
/// Timestamps are stored as unix milliseconds. `short_code` uses a binary
/// collation so codes that differ only in case stay distinct, and the target
/// uniqueness of system-generated links is enforced through a stored hash
/// column that is `NULL` for custom aliases.
#[derive(Debug, Clone)]
pub struct MySqlStore {
    pool: MySqlPool,
}

impl MySqlStore {
    /// Creates a store from an existing MySQL connection pool.
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    /// Creates a store by opening a new MySQL connection pool.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = MySqlPool::connect(database_url)
            .await
            .map_err(map_sqlx_error)?;
        Ok(Self::new(pool))
    }

    /// Returns a reference to the underlying pool.
    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<ShortLink>> {
        let row = sqlx::query(select_links!("WHERE id = ? LIMIT 1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        row.as_ref().map(link_from_row).transpose()
    }
}

fn now_millis() -> i64 {
    Timestamp::now().as_millisecond()
}

fn parse_millis(column: &str, millis: i64) -> Result<Timestamp> {
    Timestamp::from_millisecond(millis).map_err(|e| {
        StorageError::InvalidData(format!("invalid {column} timestamp '{millis}': {e}"))
    })
}

fn link_from_row(row: &MySqlRow) -> Result<ShortLink> {
    let created_at: i64 = row.try_get("created_at").map_err(map_sqlx_error)?;
    let last_updated_at: i64 = row.try_get("last_updated_at").map_err(map_sqlx_error)?;
    let code: String = row.try_get("short_code").map_err(map_sqlx_error)?;

    Ok(ShortLink {
        id: row.try_get("id").map_err(map_sqlx_error)?,
        target_address: row.try_get("target_address").map_err(map_sqlx_error)?,
        code: ShortCode::new_unchecked(code),
        is_custom_alias: row.try_get("is_custom_alias").map_err(map_sqlx_error)?,
        access_count: row.try_get("access_count").map_err(map_sqlx_error)?,
        created_at: parse_millis("created_at", created_at)?,
        last_updated_at: parse_millis("last_updated_at", last_updated_at)?,
        description: row.try_get("description").map_err(map_sqlx_error)?,
    })
}

/// Maps a unique-key violation to the index it hit, if it is one.
fn conflict_key(err: &sqlx::Error) -> Option<ConflictKey> {
    let db = err.as_database_error()?;
    if !db.is_unique_violation() {
        return None;
    }
    if db.message().contains(SYSTEM_TARGET_INDEX) {
        Some(ConflictKey::Target)
    } else {
        Some(ConflictKey::Code)
    }
}

fn map_sqlx_error(err: sqlx::Error) -> StorageError {
    let message = err.to_string();

    match err {
        sqlx::Error::PoolTimedOut => StorageError::Timeout(message),
        sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_) => StorageError::Unavailable(message),
        sqlx::Error::ColumnIndexOutOfBounds { .. }
        | sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::TypeNotFound { .. }
        | sqlx::Error::Decode(_)
        | sqlx::Error::RowNotFound => StorageError::InvalidData(message),
        _ => StorageError::Query(message),
    }
}

#[async_trait]
impl LinkStore for MySqlStore {
    async fn find_by_target(&self, target: &str) -> Result<Option<ShortLink>> {
        let row = sqlx::query(select_links!(
            "WHERE system_target_hash = UNHEX(SHA2(?, 256)) ",
            "AND target_address = ? LIMIT 1"
        ))
        .bind(target)
        .bind(target)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.as_ref().map(link_from_row).transpose()
    }

    async fn find_by_code(&self, code: &str) -> Result<Option<ShortLink>> {
        let row = sqlx::query(select_links!("WHERE short_code = ? LIMIT 1"))
            .bind(code)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        row.as_ref().map(link_from_row).transpose()
    }

    async fn exists_by_code(&self, code: &str) -> Result<bool> {
        let exists = sqlx::query(
            r#"
            SELECT 1
            FROM short_links
            WHERE short_code = ?
            LIMIT 1
            "#,
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?
        .is_some();

        Ok(exists)
    }

    async fn insert(&self, link: NewShortLink) -> Result<ShortLink> {
        let now = now_millis();

        let result = sqlx::query(
            r#"
            INSERT INTO short_links
                (target_address, short_code, is_custom_alias, access_count,
                 description, created_at, last_updated_at)
            VALUES (?, ?, ?, 0, ?, ?, ?)
            "#,
        )
        .bind(&link.target_address)
        .bind(link.code.as_str())
        .bind(link.is_custom_alias)
        .bind(&link.description)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await;

        match result {
            Ok(done) => {
                let id = i64::try_from(done.last_insert_id()).map_err(|e| {
                    StorageError::InvalidData(format!("assigned id out of range: {e}"))
                })?;
                Ok(link.into_link(id, parse_millis("created_at", now)?))
            }
            Err(err) => match conflict_key(&err) {
                Some(ConflictKey::Target) => Err(StorageError::Conflict {
                    key: ConflictKey::Target,
                    value: link.target_address,
                }),
                Some(ConflictKey::Code) => Err(StorageError::Conflict {
                    key: ConflictKey::Code,
                    value: link.code.into_string(),
                }),
                None => Err(map_sqlx_error(err)),
            },
        }
    }

    async fn update(&self, link: ShortLink) -> Result<ShortLink> {
        let result = sqlx::query(
            r#"
            UPDATE short_links
            SET short_code = ?, last_updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(link.code.as_str())
        .bind(now_millis())
        .bind(link.id)
        .execute(&self.pool)
        .await;

        if let Err(err) = result {
            return match conflict_key(&err) {
                Some(key) => Err(StorageError::Conflict {
                    key,
                    value: link.code.into_string(),
                }),
                None => Err(map_sqlx_error(err)),
            };
        }

        // MySQL reports zero affected rows for no-op updates, so re-read.
        self.find_by_id(link.id)
            .await?
            .ok_or(StorageError::NotFound(link.id))
    }

    async fn add_access_count(&self, code: &str, delta: i64) -> Result<Option<i64>> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        let updated = sqlx::query(
            r#"
            UPDATE short_links
            SET access_count = access_count + ?, last_updated_at = ?
            WHERE short_code = ?
            "#,
        )
        .bind(delta)
        .bind(now_millis())
        .bind(code)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        if updated.rows_affected() == 0 {
            tx.rollback().await.map_err(map_sqlx_error)?;
            return Ok(None);
        }

        // The row stays locked until commit, so this reads our own increment.
        let count: i64 = sqlx::query("SELECT access_count FROM short_links WHERE short_code = ?")
            .bind(code)
            .fetch_one(&mut *tx)
            .await
            .map_err(map_sqlx_error)?
            .try_get("access_count")
            .map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(Some(count))
    }

    async fn count(&self) -> Result<i64> {
        sqlx::query("SELECT COUNT(*) AS total FROM short_links")
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)?
            .try_get("total")
            .map_err(map_sqlx_error)
    }

    async fn sum_access_count(&self) -> Result<i64> {
        sqlx::query(
            "SELECT CAST(COALESCE(SUM(access_count), 0) AS SIGNED) AS total FROM short_links",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_error)?
        .try_get("total")
        .map_err(map_sqlx_error)
    }

    async fn count_custom_aliases(&self) -> Result<i64> {
        sqlx::query("SELECT COUNT(*) AS total FROM short_links WHERE is_custom_alias = TRUE")
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)?
            .try_get("total")
            .map_err(map_sqlx_error)
    }

    async fn find_hot_links(&self, min_access_count: i64) -> Result<Vec<ShortLink>> {
        let rows = sqlx::query(select_links!(
            "WHERE access_count > ? ",
            "ORDER BY access_count DESC, id ASC"
        ))
        .bind(min_access_count)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.iter().map(link_from_row).collect()
    }

    async fn find_created_between(
        &self,
        start: Timestamp,
        end: Timestamp,
    ) -> Result<Vec<ShortLink>> {
        let rows = sqlx::query(select_links!(
            "WHERE created_at BETWEEN ? AND ? ",
            "ORDER BY created_at ASC, id ASC"
        ))
        .bind(start.as_millisecond())
        .bind(end.as_millisecond())
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.iter().map(link_from_row).collect()
    }
}
