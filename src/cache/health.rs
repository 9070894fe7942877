// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Keeps the persisted read-cache blob under the storage ceiling.
//!
//! Every [`persist`](CacheHealthManager::persist) measures the serialized
//! blob first and escalates:
//!
//! ```text
//!  usage < 80%        write as-is
//!  80% ≤ usage < 90%  drop oldest 20% of entries, write
//!  90% ≤ usage < 95%  drop oldest 30% of entries, write
//!  usage ≥ 95%        remove blob, enter memory-only mode
//! ```
//!
//! Memory-only mode is sticky until [`reset`](CacheHealthManager::reset):
//! later persists are skipped, so the session keeps its in-memory cache but
//! nothing survives a reload. A write the store rejects (quota) degrades
//! the same way. A blob that fails to parse is removed and reported
//! unhealthy; nothing is ever thrown to the caller.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::config::OfflineSyncConfig;
use crate::storage::StorageAdapter;

use super::blob::PersistedCache;
use super::eviction::{select_victims, EvictionStrategy};
use super::pressure::{CachePressure, CacheThresholds};

/// Result of a health check against the stored blob.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheHealth {
    pub healthy: bool,
    pub size_bytes: usize,
    /// `size_bytes / max_bytes`
    pub usage: f64,
    pub level: CachePressure,
    pub memory_only: bool,
    /// The stored blob failed to parse and was removed
    pub corrupted: bool,
}

/// What a persist call did.
#[derive(Debug, Clone, PartialEq)]
pub enum PersistOutcome {
    /// Blob written. `evicted` holds the query keys trimmed to fit.
    Written {
        bytes: usize,
        level: CachePressure,
        evicted: Vec<String>,
    },
    /// Memory-only mode is active; nothing written.
    Skipped,
    /// Blob discarded and memory-only mode entered.
    Degraded { reason: DegradeReason },
}

/// Counters kept by the manager itself, without touching storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub persisted_bytes: usize,
    pub max_bytes: usize,
    pub memory_only: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DegradeReason {
    /// Blob still at or above the critical threshold
    CriticalSize,
    /// The store refused the write
    WriteRejected,
}

pub struct CacheHealthManager {
    storage: StorageAdapter,
    cache_key: String,
    max_bytes: usize,
    thresholds: CacheThresholds,
    strategy: EvictionStrategy,
    memory_only: AtomicBool,
    last_persisted_bytes: AtomicUsize,
    lock: Mutex<()>,
}

impl CacheHealthManager {
    pub fn new(storage: StorageAdapter, config: &OfflineSyncConfig) -> Self {
        Self {
            storage,
            cache_key: config.cache_key.clone(),
            max_bytes: config.cache_max_bytes.max(1),
            thresholds: CacheThresholds {
                standard: config.cache_warn_ratio,
                aggressive: config.cache_aggressive_ratio,
                critical: config.cache_critical_ratio,
                standard_eviction: config.cache_standard_eviction,
                aggressive_eviction: config.cache_aggressive_eviction,
            },
            strategy: config.eviction_strategy,
            memory_only: AtomicBool::new(false),
            last_persisted_bytes: AtomicUsize::new(0),
            lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn is_memory_only(&self) -> bool {
        self.memory_only.load(Ordering::Acquire)
    }

    /// Size of the last blob this manager wrote.
    #[must_use]
    pub fn last_persisted_bytes(&self) -> usize {
        self.last_persisted_bytes.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            persisted_bytes: self.last_persisted_bytes(),
            max_bytes: self.max_bytes,
            memory_only: self.is_memory_only(),
        }
    }

    fn usage(&self, bytes: usize) -> f64 {
        bytes as f64 / self.max_bytes as f64
    }

    /// Health-check, trim if needed, and write the blob.
    pub fn persist(&self, cache: &PersistedCache) -> PersistOutcome {
        let _guard = self.lock.lock();

        if self.is_memory_only() {
            debug!(key = %self.cache_key, "Memory-only mode, cache persist skipped");
            crate::metrics::record_cache_write_skipped();
            return PersistOutcome::Skipped;
        }

        let Some(mut json) = serialize(cache) else {
            return PersistOutcome::Skipped;
        };
        let mut level = self.thresholds.level(self.usage(json.len()));
        let mut evicted = Vec::new();

        if let Some(fraction) = self.thresholds.eviction_fraction(level) {
            let victims = select_victims(&cache.entries, fraction, self.strategy);
            let mut doomed = vec![false; cache.entries.len()];
            for &i in &victims {
                doomed[i] = true;
                evicted.push(cache.entries[i].query_key.clone());
            }
            let trimmed = PersistedCache::new(
                cache.timestamp,
                cache
                    .entries
                    .iter()
                    .zip(&doomed)
                    .filter(|(_, gone)| !**gone)
                    .map(|(entry, _)| entry.clone())
                    .collect(),
            );

            let before = json.len();
            let Some(trimmed_json) = serialize(&trimmed) else {
                return PersistOutcome::Skipped;
            };
            json = trimmed_json;
            info!(
                level = %level,
                evicted = evicted.len(),
                remaining = trimmed.entries.len(),
                bytes_before = before,
                bytes_after = json.len(),
                "{}",
                level.description()
            );
            crate::metrics::record_cache_eviction(level.as_str(), evicted.len(), before.saturating_sub(json.len()));
            level = self.thresholds.level(self.usage(json.len()));
        }

        if level.should_degrade() {
            self.degrade(DegradeReason::CriticalSize, json.len());
            return PersistOutcome::Degraded { reason: DegradeReason::CriticalSize };
        }

        if !self.storage.set(&self.cache_key, &json) {
            self.degrade(DegradeReason::WriteRejected, json.len());
            return PersistOutcome::Degraded { reason: DegradeReason::WriteRejected };
        }

        let bytes = json.len();
        self.last_persisted_bytes.store(bytes, Ordering::Relaxed);
        crate::metrics::set_cache_bytes(bytes);
        crate::metrics::set_cache_usage(self.usage(bytes));
        debug!(key = %self.cache_key, bytes, level = %level, "Cache persisted");

        PersistOutcome::Written { bytes, level, evicted }
    }

    /// Load the persisted blob. Corrupted data is removed and reads as `None`.
    pub fn restore(&self) -> Option<PersistedCache> {
        let _guard = self.lock.lock();
        if self.is_memory_only() {
            return None;
        }
        let raw = self.storage.get(&self.cache_key)?;
        match serde_json::from_str::<PersistedCache>(&raw) {
            Ok(cache) => {
                debug!(entries = cache.entries.len(), bytes = raw.len(), "Cache restored");
                Some(cache)
            }
            Err(e) => {
                self.wipe_corrupted(&e, raw.len());
                None
            }
        }
    }

    /// Inspect the stored blob. Never fails; problems show up as `healthy: false`.
    pub fn check_health(&self) -> CacheHealth {
        let _guard = self.lock.lock();
        let memory_only = self.is_memory_only();

        let Some(raw) = self.storage.get(&self.cache_key) else {
            return CacheHealth {
                healthy: !memory_only,
                size_bytes: 0,
                usage: 0.0,
                level: CachePressure::Normal,
                memory_only,
                corrupted: false,
            };
        };

        let size_bytes = raw.len();
        let usage = self.usage(size_bytes);

        if let Err(e) = serde_json::from_str::<PersistedCache>(&raw) {
            self.wipe_corrupted(&e, size_bytes);
            return CacheHealth {
                healthy: false,
                size_bytes: 0,
                usage: 0.0,
                level: CachePressure::Normal,
                memory_only,
                corrupted: true,
            };
        }

        let level = self.thresholds.level(usage);
        if level.should_degrade() {
            self.degrade(DegradeReason::CriticalSize, size_bytes);
            return CacheHealth {
                healthy: false,
                size_bytes: 0,
                usage: 0.0,
                level,
                memory_only: true,
                corrupted: false,
            };
        }

        crate::metrics::set_cache_bytes(size_bytes);
        crate::metrics::set_cache_usage(usage);
        CacheHealth {
            healthy: !memory_only,
            size_bytes,
            usage,
            level,
            memory_only,
            corrupted: false,
        }
    }

    /// Leave memory-only mode and drop the blob (logout / clear).
    pub fn reset(&self) {
        let _guard = self.lock.lock();
        self.storage.remove(&self.cache_key);
        self.memory_only.store(false, Ordering::Release);
        self.last_persisted_bytes.store(0, Ordering::Relaxed);
        crate::metrics::set_memory_only(false);
        crate::metrics::set_cache_bytes(0);
        info!(key = %self.cache_key, "Cache reset, persistence re-enabled");
    }

    fn degrade(&self, reason: DegradeReason, bytes: usize) {
        self.storage.remove(&self.cache_key);
        self.memory_only.store(true, Ordering::Release);
        self.last_persisted_bytes.store(0, Ordering::Relaxed);
        warn!(
            key = %self.cache_key,
            ?reason,
            bytes,
            max_bytes = self.max_bytes,
            "{}",
            CachePressure::Critical.description()
        );
        crate::metrics::set_memory_only(true);
        crate::metrics::set_cache_bytes(0);
    }

    fn wipe_corrupted(&self, error: &serde_json::Error, bytes: usize) {
        warn!(key = %self.cache_key, error = %error, bytes, "Cache blob corrupted, wiping");
        crate::metrics::record_corruption("cache");
        self.storage.remove(&self.cache_key);
        self.last_persisted_bytes.store(0, Ordering::Relaxed);
    }
}

fn serialize(cache: &PersistedCache) -> Option<String> {
    match serde_json::to_string(cache) {
        Ok(json) => Some(json),
        Err(e) => {
            warn!(error = %e, "Failed to serialize cache");
            None
        }
    }
}
