// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Size thresholds for the persisted cache blob.
//!
//! Four-tier escalation measured against the storage ceiling; see [`CachePressure`].
//!
//! # Example
//!
//! ```
//! use offline_sync::{CachePressure, CacheThresholds};
//!
//! let thresholds = CacheThresholds::default();
//! assert_eq!(thresholds.level(0.5), CachePressure::Normal);
//! assert_eq!(thresholds.level(0.85), CachePressure::Standard);
//! assert_eq!(thresholds.level(0.92), CachePressure::Aggressive);
//! assert_eq!(thresholds.level(0.95), CachePressure::Critical);
//! assert!(CachePressure::Critical.should_degrade());
//! ```

/// Pressure level of the persisted cache.
///
/// - **Normal** (< 80%): write as-is
/// - **Standard** (80-90%): evict the oldest 20% of entries
/// - **Aggressive** (90-95%): evict the oldest 30% of entries
/// - **Critical** (>= 95%): discard the blob, switch to memory-only
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CachePressure {
    Normal = 0,
    Standard = 1,
    Aggressive = 2,
    Critical = 3,
}

impl CachePressure {
    /// Whether persistence should be abandoned at this level
    #[must_use]
    pub fn should_degrade(&self) -> bool {
        matches!(self, Self::Critical)
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Standard => "standard",
            Self::Aggressive => "aggressive",
            Self::Critical => "critical",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Normal => "Normal operation",
            Self::Standard => "Standard cleanup - evicting oldest entries",
            Self::Aggressive => "Aggressive cleanup - evicting more of the oldest entries",
            Self::Critical => "Critical - cache discarded, memory-only mode",
        }
    }
}

impl std::fmt::Display for CachePressure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Threshold ratios (fractions of the ceiling) and eviction fractions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CacheThresholds {
    pub standard: f64,
    pub aggressive: f64,
    pub critical: f64,
    /// Share of entries removed at `Standard`
    pub standard_eviction: f64,
    /// Share of entries removed at `Aggressive`
    pub aggressive_eviction: f64,
}

impl Default for CacheThresholds {
    fn default() -> Self {
        Self {
            standard: 0.80,
            aggressive: 0.90,
            critical: 0.95,
            standard_eviction: 0.20,
            aggressive_eviction: 0.30,
        }
    }
}

impl CacheThresholds {
    /// Classify a usage ratio (bytes / ceiling).
    #[must_use]
    pub fn level(&self, usage: f64) -> CachePressure {
        match usage {
            u if u >= self.critical => CachePressure::Critical,
            u if u >= self.aggressive => CachePressure::Aggressive,
            u if u >= self.standard => CachePressure::Standard,
            _ => CachePressure::Normal,
        }
    }

    /// Share of entries to evict at `level`, if any.
    #[must_use]
    pub fn eviction_fraction(&self, level: CachePressure) -> Option<f64> {
        match level {
            CachePressure::Normal | CachePressure::Critical => None,
            CachePressure::Standard => Some(self.standard_eviction),
            CachePressure::Aggressive => Some(self.aggressive_eviction),
        }
    }
}
