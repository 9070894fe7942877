// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Shape of the persisted read-cache document.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One cached query result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    /// Serialized query key, e.g. `["workouts","list"]`
    pub query_key: String,
    /// Epoch millis the data was last refreshed; the LRU recency signal
    pub updated_at: i64,
    pub data: Value,
}

impl CacheEntry {
    pub fn new(query_key: impl Into<String>, updated_at: i64, data: Value) -> Self {
        Self {
            query_key: query_key.into(),
            updated_at,
            data,
        }
    }

    /// Serialized size of this entry alone.
    #[must_use]
    pub fn size_bytes(&self) -> usize {
        serde_json::to_vec(self).map(|v| v.len()).unwrap_or(0)
    }
}

/// The whole cache as one document under a versioned key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedCache {
    /// Epoch millis the document was produced
    pub timestamp: i64,
    pub entries: Vec<CacheEntry>,
}

impl PersistedCache {
    pub fn new(timestamp: i64, entries: Vec<CacheEntry>) -> Self {
        Self { timestamp, entries }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
