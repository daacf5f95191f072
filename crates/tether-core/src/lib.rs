//! Core types and traits for the Tether link resolution engine.
//!
//! This crate holds the pure parts of the engine (the base62 [`codec`] and
//! the custom [`alias`] policy), the persistent [`ShortLink`] record, and the
//! two adapter contracts the services are written against: [`LinkStore`] for
//! durable storage and [`KvCache`] for the shared key/value cache.

pub mod alias;
pub mod cache;
pub mod codec;
pub mod error;
pub mod record;
pub mod shortcode;
pub mod stats;
pub mod store;

pub use alias::AliasPolicy;
pub use cache::KvCache;
pub use error::{CacheError, ConflictKey, CoreError, StorageError};
pub use record::{NewShortLink, ShortLink};
pub use shortcode::ShortCode;
pub use stats::SystemStats;
pub use store::LinkStore;
