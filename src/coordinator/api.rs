// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Operations the host calls during a session.

use tokio::sync::watch;
use tracing::{debug, info};

use crate::cache::{CacheHealth, PersistOutcome, PersistedCache};
use crate::queue::{Operation, Priority, QueueItem};
use crate::scheduler::{DrainOutcome, SyncError};
use crate::status::{Subscription, SyncStatus};

use super::{HealthCheck, OfflineSync};

impl OfflineSync {
    /// Record a user action for later delivery. Returns the queue item id.
    ///
    /// Never fails: if storage rejects the write the item lives only until
    /// the process exits, and a warning is logged.
    pub fn enqueue(&self, operation: Operation, priority: Priority) -> String {
        let id = self.queue.enqueue(operation, priority);
        self.refresh_status();
        id
    }

    /// Cancel a queued operation that has not been sent yet.
    pub fn cancel(&self, id: &str) -> bool {
        let removed = self.queue.remove(id);
        if removed {
            self.refresh_status();
        }
        removed
    }

    /// Queued operations in drain order.
    #[must_use]
    pub fn pending(&self) -> Vec<QueueItem> {
        self.queue.peek_all()
    }

    /// Operations given up on. Empty unless `dead_letter_capacity > 0`.
    #[must_use]
    pub fn dead_letters(&self) -> Vec<QueueItem> {
        self.queue.dead_letters()
    }

    pub fn clear_dead_letters(&self) {
        self.queue.clear_dead_letters();
        self.refresh_status();
    }

    /// Drain now and wait for the result.
    pub async fn sync_now(&self) -> Result<DrainOutcome, SyncError> {
        self.scheduler.sync_now().await
    }

    /// Feed a platform connectivity event.
    ///
    /// Going online wakes a running scheduler for an immediate drain.
    pub fn set_online(&self, online: bool) {
        self.network.set_online(online);
        self.status.set_online(online);
        self.refresh_status();
    }

    #[must_use]
    pub fn is_online(&self) -> bool {
        self.network.is_online()
    }

    /// Watch channel with the latest [`SyncStatus`].
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SyncStatus> {
        self.status.subscribe()
    }

    /// Register a callback for every status change. Drop the handle to unsubscribe.
    pub fn on_sync_status_change<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&SyncStatus) + Send + Sync + 'static,
    {
        self.status.on_change(callback)
    }

    /// Persist the read cache, trimming or degrading it as needed.
    pub fn persist_cache(&self, cache: &PersistedCache) -> PersistOutcome {
        let was_memory_only = self.cache.is_memory_only();
        let outcome = self.cache.persist(cache);
        if self.cache.is_memory_only() != was_memory_only {
            info!("Read cache switched to memory-only mode");
            self.refresh_status();
        }
        outcome
    }

    /// Load the read cache saved by a previous session.
    pub fn restore_cache(&self) -> Option<PersistedCache> {
        let restored = self.cache.restore();
        debug!(entries = restored.as_ref().map_or(0, PersistedCache::len), "Read cache restore");
        restored
    }

    pub fn cache_health(&self) -> CacheHealth {
        let was_memory_only = self.cache.is_memory_only();
        let health = self.cache.check_health();
        if health.memory_only != was_memory_only {
            self.refresh_status();
        }
        health
    }

    /// Snapshot of every service.
    pub fn health_check(&self) -> HealthCheck {
        HealthCheck {
            online: self.network.is_online(),
            scheduler_running: self.scheduler.is_running(),
            scheduler_state: self.scheduler.state(),
            queue: self.queue.status(),
            dead_letters: self.queue.dead_letters().len(),
            cache: self.cache_health(),
        }
    }
}
