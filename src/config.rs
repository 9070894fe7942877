// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Configuration for the offline sync layer.
//!
//! # Example
//!
//! ```
//! use offline_sync::OfflineSyncConfig;
//!
//! // Minimal config (uses defaults)
//! let config = OfflineSyncConfig::default();
//! assert_eq!(config.cache_max_bytes, 5 * 1024 * 1024); // 5 MiB
//! assert_eq!(config.max_attempts, 3);
//!
//! // Tuned config
//! let config = OfflineSyncConfig {
//!     batch_size: 10,
//!     sync_interval_ms: 10_000,
//!     dead_letter_capacity: 50,
//!     ..Default::default()
//! };
//! assert_eq!(config.batch_size, 10);
//! ```

use std::time::Duration;

use serde::Deserialize;

use crate::cache::EvictionStrategy;
use crate::queue::BackoffConfig;

/// Configuration for the offline sync layer.
///
/// All fields have defaults matching a browser-class key/value store
/// (5 MiB quota, 30 second sync period).
#[derive(Debug, Clone, Deserialize)]
pub struct OfflineSyncConfig {
    /// Storage key holding the persisted mutation queue
    #[serde(default = "default_queue_key")]
    pub queue_key: String,

    /// Storage key holding the last published sync status
    #[serde(default = "default_status_key")]
    pub status_key: String,

    /// Storage key holding parked (exhausted) operations
    #[serde(default = "default_dead_letter_key")]
    pub dead_letter_key: String,

    /// Versioned storage key for the read-cache blob.
    /// Bump the version suffix to invalidate every prior cache shape.
    #[serde(default = "default_cache_key")]
    pub cache_key: String,

    /// Attempts before an operation is treated as a poison pill
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Retry backoff: base delay in ms
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
    /// Retry backoff: delay cap in ms (before jitter)
    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,
    /// Retry backoff: exclusive upper bound of uniform jitter in ms
    #[serde(default = "default_backoff_jitter_ms")]
    pub backoff_jitter_ms: u64,

    /// Period of the background sync timer
    #[serde(default = "default_sync_interval_ms")]
    pub sync_interval_ms: u64,

    /// Max operations processed per drain
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Parked operations kept for inspection (0 = drop exhausted items)
    #[serde(default)]
    pub dead_letter_capacity: usize,

    /// Hard ceiling for the persisted cache blob (default: 5 MiB)
    #[serde(default = "default_cache_max_bytes")]
    pub cache_max_bytes: usize,

    /// Cache thresholds as fractions of `cache_max_bytes`
    #[serde(default = "default_cache_warn_ratio")]
    pub cache_warn_ratio: f64,
    #[serde(default = "default_cache_aggressive_ratio")]
    pub cache_aggressive_ratio: f64,
    #[serde(default = "default_cache_critical_ratio")]
    pub cache_critical_ratio: f64,

    /// Fraction of cache entries evicted at the warn / aggressive thresholds
    #[serde(default = "default_cache_standard_eviction")]
    pub cache_standard_eviction: f64,
    #[serde(default = "default_cache_aggressive_eviction")]
    pub cache_aggressive_eviction: f64,

    /// How eviction measures the fraction to remove
    #[serde(default)]
    pub eviction_strategy: EvictionStrategy,
}

fn default_queue_key() -> String { "offline-sync:queue".into() }
fn default_status_key() -> String { "offline-sync:status".into() }
fn default_dead_letter_key() -> String { "offline-sync:dead-letters".into() }
fn default_cache_key() -> String { "offline-sync:query-cache:v1".into() }
fn default_max_attempts() -> u32 { 3 }
fn default_backoff_base_ms() -> u64 { 1_000 }
fn default_backoff_max_ms() -> u64 { 30_000 }
fn default_backoff_jitter_ms() -> u64 { 1_000 }
fn default_sync_interval_ms() -> u64 { 30_000 }
fn default_batch_size() -> usize { 5 }
fn default_cache_max_bytes() -> usize { 5 * 1024 * 1024 } // 5 MiB
fn default_cache_warn_ratio() -> f64 { 0.80 }
fn default_cache_aggressive_ratio() -> f64 { 0.90 }
fn default_cache_critical_ratio() -> f64 { 0.95 }
fn default_cache_standard_eviction() -> f64 { 0.20 }
fn default_cache_aggressive_eviction() -> f64 { 0.30 }

impl Default for OfflineSyncConfig {
    fn default() -> Self {
        Self {
            queue_key: default_queue_key(),
            status_key: default_status_key(),
            dead_letter_key: default_dead_letter_key(),
            cache_key: default_cache_key(),
            max_attempts: default_max_attempts(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_max_ms: default_backoff_max_ms(),
            backoff_jitter_ms: default_backoff_jitter_ms(),
            sync_interval_ms: default_sync_interval_ms(),
            batch_size: default_batch_size(),
            dead_letter_capacity: 0,
            cache_max_bytes: default_cache_max_bytes(),
            cache_warn_ratio: default_cache_warn_ratio(),
            cache_aggressive_ratio: default_cache_aggressive_ratio(),
            cache_critical_ratio: default_cache_critical_ratio(),
            cache_standard_eviction: default_cache_standard_eviction(),
            cache_aggressive_eviction: default_cache_aggressive_eviction(),
            eviction_strategy: EvictionStrategy::default(),
        }
    }
}

impl OfflineSyncConfig {
    /// Retry controller settings derived from this config.
    #[must_use]
    pub fn backoff(&self) -> BackoffConfig {
        BackoffConfig {
            base_delay: Duration::from_millis(self.backoff_base_ms),
            max_delay: Duration::from_millis(self.backoff_max_ms),
            max_jitter: Duration::from_millis(self.backoff_jitter_ms),
            factor: 2.0,
        }
    }

    /// Background timer period.
    #[must_use]
    pub fn sync_interval(&self) -> Duration {
        Duration::from_millis(self.sync_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = OfflineSyncConfig::default();
        assert_eq!(config.batch_size, 5);
        assert_eq!(config.sync_interval(), Duration::from_secs(30));
        assert_eq!(config.dead_letter_capacity, 0);
        assert_eq!(config.eviction_strategy, EvictionStrategy::Count);
        assert!(config.cache_warn_ratio < config.cache_aggressive_ratio);
        assert!(config.cache_aggressive_ratio < config.cache_critical_ratio);
    }

    #[test]
    fn test_deserialize_partial_uses_defaults() {
        let config: OfflineSyncConfig = serde_json::from_str(
            r#"{"batch_size": 12, "cache_key": "cache:v2", "eviction_strategy": "bytes"}"#,
        )
        .unwrap();

        assert_eq!(config.batch_size, 12);
        assert_eq!(config.cache_key, "cache:v2");
        assert_eq!(config.eviction_strategy, EvictionStrategy::Bytes);
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.queue_key, "offline-sync:queue");
    }

    #[test]
    fn test_backoff_from_config() {
        let config = OfflineSyncConfig {
            backoff_base_ms: 10,
            backoff_max_ms: 100,
            backoff_jitter_ms: 0,
            ..Default::default()
        };
        let backoff = config.backoff();
        assert_eq!(backoff.base_delay, Duration::from_millis(10));
        assert_eq!(backoff.max_delay, Duration::from_millis(100));
        assert_eq!(backoff.max_jitter, Duration::ZERO);
    }
}
