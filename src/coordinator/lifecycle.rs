// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Coordinator lifecycle: start, stop, reset.

use tracing::info;

use crate::scheduler::SyncError;

use super::OfflineSync;

impl OfflineSync {
    /// Start background syncing. Idempotent; needs a Tokio runtime.
    #[tracing::instrument(skip(self))]
    pub fn start(&self) -> Result<(), SyncError> {
        self.refresh_status();
        self.scheduler.start()
    }

    /// Stop background syncing, letting an in-flight drain finish.
    #[tracing::instrument(skip(self))]
    pub async fn stop(&self) -> Result<(), SyncError> {
        self.scheduler.stop().await
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.scheduler.is_running()
    }

    /// Forget everything this session stored (logout).
    ///
    /// Clears the queue, dead letters, the cache blob with its memory-only
    /// flag, and the persisted status. The scheduler keeps its lifecycle
    /// state; stop it first if the session is ending.
    #[tracing::instrument(skip(self))]
    pub fn reset(&self) {
        self.queue.clear();
        self.queue.clear_dead_letters();
        self.cache.reset();
        self.status.reset(self.network.is_online());
        info!("Offline sync state reset");
    }
}
