//! Key/value cache adapters for the Tether [`KvCache`] contract.

pub mod moka;
pub mod redis;

pub use self::moka::{CacheConfig, MokaKvCache};
pub use self::redis::RedisKvCache;
pub use tether_core::cache::{KvCache, Result};
pub use tether_core::CacheError;
