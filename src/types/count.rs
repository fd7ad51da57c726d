//! Group-by count results

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::is_zero;

/// Result of a grouping query
///
/// An empty store serializes to exactly `{"record_count": 0}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupCountResult {
    /// Count per distinct group key, in first-seen order
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub counts: IndexMap<String, u64>,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub grouped_key_count: u64,
    pub record_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_count: Option<u64>,
    /// The `group_by` path as requested; absent for count-all and empty results
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grouped_by: Option<String>,
}

impl GroupCountResult {
    /// The result for a store with no records
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.record_count == 0
    }

    /// Look up the count for a single key
    pub fn count_for(&self, key: &str) -> u64 {
        self.counts.get(key).copied().unwrap_or(0)
    }
}
