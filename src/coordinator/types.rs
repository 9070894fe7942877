// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Public types for the offline sync coordinator.

use crate::cache::CacheHealth;
use crate::queue::QueueStatus;
use crate::scheduler::SchedulerState;

/// Point-in-time view of every service, for diagnostics screens.
#[derive(Debug, Clone, PartialEq)]
pub struct HealthCheck {
    pub online: bool,
    pub scheduler_running: bool,
    pub scheduler_state: SchedulerState,
    pub queue: QueueStatus,
    pub dead_letters: usize,
    pub cache: CacheHealth,
}

impl HealthCheck {
    /// Nothing stuck and the cache still persisting.
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        self.queue.failed == 0 && self.cache.healthy
    }
}

impl std::fmt::Display for HealthCheck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Health(online={}, scheduler={}, pending={}, failed={}, cache={}{})",
            self.online,
            self.scheduler_state,
            self.queue.pending,
            self.queue.failed,
            self.cache.level,
            if self.cache.memory_only { ", memory-only" } else { "" }
        )
    }
}
