use tether_core::{CacheError, CoreError, StorageError};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ResolverError>;

/// Errors surfaced to the boundary layer.
///
/// `InvalidArgument`, `Conflict` and `Overflow` are caller errors and are
/// never retried. Adapter faults are carried unchanged in `Storage` and
/// `Cache`; retry policy belongs to the caller.
#[derive(Debug, Clone, Error)]
pub enum ResolverError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("overflow: {0}")]
    Overflow(String),
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("cache error: {0}")]
    Cache(#[from] CacheError),
}

impl From<CoreError> for ResolverError {
    fn from(value: CoreError) -> Self {
        match value {
            CoreError::InvalidArgument(message) => Self::InvalidArgument(message),
            CoreError::Overflow(message) => Self::Overflow(message),
        }
    }
}
