//! Short-code resolution: link creation, a cache-aside read path and
//! best-effort access counting, composed behind [`ResolutionService`].

pub mod cached;
pub mod config;
pub mod counter;
pub mod creation;
pub mod error;
pub mod service;

#[cfg(test)]
mod testing;

pub use cached::CachedResolver;
pub use config::ResolverConfig;
pub use counter::{CounterFlusher, FlusherHandle, HitRecorder};
pub use creation::LinkCreator;
pub use error::{ResolverError, Result};
pub use service::ResolutionService;
