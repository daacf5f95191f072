use thiserror::Error;

/// Errors raised by the pure parts of the engine (codec and alias policy).
pub type Result<T> = std::result::Result<T, CoreError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("numeric overflow: {0}")]
    Overflow(String),
}

/// The unique index a conflicting write collided with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictKey {
    /// The globally unique short code.
    Code,
    /// The target address of a system-generated link.
    Target,
}

impl std::fmt::Display for ConflictKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConflictKey::Code => f.write_str("code"),
            ConflictKey::Target => f.write_str("target"),
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum StorageError {
    #[error("unique {key} already exists: {value}")]
    Conflict { key: ConflictKey, value: String },
    #[error("no link with id {0}")]
    NotFound(i64),
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),
    #[error("storage operation timed out: {0}")]
    Timeout(String),
    #[error("storage query failed: {0}")]
    Query(String),
    #[error("stored data is invalid: {0}")]
    InvalidData(String),
}

#[derive(Debug, Clone, Error)]
pub enum CacheError {
    #[error("cache backend unavailable: {0}")]
    Unavailable(String),
    #[error("cache operation timed out: {0}")]
    Timeout(String),
    #[error("cache serialization failed: {0}")]
    Serialization(String),
    #[error("cache value is invalid: {0}")]
    InvalidData(String),
    #[error("cache operation failed: {0}")]
    Operation(String),
}
