use serde::{Deserialize, Serialize};

/// Aggregate counters over all stored links.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SystemStats {
    pub total_links: i64,
    pub total_access: i64,
    pub custom_aliases: i64,
}
