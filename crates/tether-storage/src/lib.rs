//! Store adapters for the Tether [`LinkStore`](tether_core::LinkStore) contract.

pub mod memory;
pub mod mysql;

pub use memory::InMemoryStore;
pub use mysql::MySqlStore;
pub use tether_core::store::{LinkStore, Result};
pub use tether_core::{ConflictKey, StorageError};
