// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

use serde::{Deserialize, Serialize};

use super::blob::CacheEntry;

/// How the eviction fraction is measured.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvictionStrategy {
    /// Fraction of the entry count. Assumes roughly uniform entry sizes.
    #[default]
    Count,
    /// Fraction of the serialized bytes, accumulated oldest first.
    Bytes,
}

/// Pick the oldest entries to drop, returning their indices (oldest first).
///
/// `Count` removes `round(len * fraction)` entries, at least one when the
/// fraction is positive. `Bytes` keeps taking the oldest entry until the
/// removed bytes reach `fraction` of the total.
pub fn select_victims(entries: &[CacheEntry], fraction: f64, strategy: EvictionStrategy) -> Vec<usize> {
    if entries.is_empty() || fraction <= 0.0 {
        return Vec::new();
    }

    let mut by_age: Vec<usize> = (0..entries.len()).collect();
    // Stable: entries with equal timestamps keep document order
    by_age.sort_by_key(|&i| entries[i].updated_at);

    match strategy {
        EvictionStrategy::Count => {
            let count = ((entries.len() as f64 * fraction).round() as usize)
                .max(1)
                .min(entries.len());
            by_age.truncate(count);
            by_age
        }
        EvictionStrategy::Bytes => {
            let sizes: Vec<usize> = entries.iter().map(CacheEntry::size_bytes).collect();
            let total: usize = sizes.iter().sum();
            let target = (total as f64 * fraction).ceil() as usize;

            let mut removed = 0usize;
            let mut victims = Vec::new();
            for i in by_age {
                if removed >= target {
                    break;
                }
                removed += sizes[i];
                victims.push(i);
            }
            victims
        }
    }
}
