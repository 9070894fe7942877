// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Persisted read-cache with size-based health management.

pub mod blob;
pub mod eviction;
pub mod health;
pub mod pressure;

pub use blob::{CacheEntry, PersistedCache};
pub use eviction::{select_victims, EvictionStrategy};
pub use health::{CacheHealth, CacheHealthManager, CacheStats, DegradeReason, PersistOutcome};
pub use pressure::{CachePressure, CacheThresholds};
