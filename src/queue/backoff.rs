// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Retry delay with exponential backoff and jitter.
//!
//! `delay(n) = min(base * factor^n, max_delay) + jitter`, jitter uniform in
//! `[0, max_jitter)`. The deterministic part is exposed separately as
//! [`BackoffConfig::base_delay`] so ordering properties can be checked
//! without randomness.
//!
//! # Example
//!
//! ```
//! use offline_sync::BackoffConfig;
//! use std::time::Duration;
//!
//! let backoff = BackoffConfig::default();
//! assert_eq!(backoff.base_delay(0), Duration::from_secs(1));
//! assert_eq!(backoff.base_delay(3), Duration::from_secs(8));
//! assert_eq!(backoff.base_delay(10), Duration::from_secs(30)); // capped
//!
//! let delay = backoff.delay(10);
//! assert!(delay >= Duration::from_secs(30));
//! assert!(delay < Duration::from_secs(31));
//! ```

use std::time::Duration;

use rand::Rng;

/// Backoff settings for requeued operations.
#[derive(Debug, Clone)]
pub struct BackoffConfig {
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Exclusive upper bound of the uniform jitter added to every delay
    pub max_jitter: Duration,
    pub factor: f64,
}

impl Default for BackoffConfig {
    /// 1s base, doubling, capped at 30s, plus up to 1s of jitter.
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_jitter: Duration::from_secs(1),
            factor: 2.0,
        }
    }
}

impl BackoffConfig {
    /// No delay at all: failed items are eligible again immediately.
    #[must_use]
    pub fn immediate() -> Self {
        Self {
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            max_jitter: Duration::ZERO,
            factor: 2.0,
        }
    }

    /// Delay before jitter for the given attempt count.
    #[must_use]
    pub fn base_delay(&self, attempts: u32) -> Duration {
        let exponent = attempts.min(i32::MAX as u32) as i32;
        let max_ms = self.max_delay.as_millis() as f64;
        let scaled = self.base_delay.as_millis() as f64 * self.factor.powi(exponent);
        // min() absorbs inf and NaN (0 * inf) alike
        let capped = scaled.min(max_ms);
        if capped > 0.0 {
            Duration::from_millis(capped as u64)
        } else {
            Duration::ZERO
        }
    }

    /// Delay including jitter; this is what the queue applies.
    #[must_use]
    pub fn delay(&self, attempts: u32) -> Duration {
        self.base_delay(attempts) + self.jitter()
    }

    /// Largest value [`delay`](Self::delay) can ever return.
    #[must_use]
    pub fn ceiling(&self) -> Duration {
        self.max_delay + self.max_jitter
    }

    fn jitter(&self) -> Duration {
        let max_ms = self.max_jitter.as_millis() as u64;
        if max_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..max_ms))
    }
}
