// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Background sync scheduler.
//!
//! Drains the [`MutationQueue`] through the injected
//! [`OperationExecutor`] whenever it is woken:
//!
//! ```text
//!   timer tick ─┐
//!   online edge ┼──► drain (if Idle) ──► dequeue ─► execute ─┬─ Ok ──────► processed += 1
//!   sync_now() ─┘        │                  ▲                ├─ Transient ► requeue_with_backoff
//!                        │                  └── while online ┴─ Permanent ► drop_item
//!                        │                      and processed < batch_size
//!                        │                      and calls < 2 * batch_size
//!                        ▼
//!   processed > 0 ► mark last sync, invalidate resource groups
//!   always        ► recompute SyncStatus
//! ```
//!
//! # Serialization
//!
//! Two drains would both read-modify-write the same persisted queue, and
//! the loser's write would undo the winner's. A trigger that arrives while a
//! drain is running is therefore skipped, not queued
//! ([`DrainOutcome::Skipped`]).
//!
//! # Stopping
//!
//! [`SyncScheduler::stop`] prevents future drains. A drain already in flight
//! runs to completion; batches are capped, so that is bounded.

mod drain;
mod lifecycle;
pub mod types;

pub use types::{DrainOutcome, DrainReport, DrainTrigger, SchedulerState, SyncError};

use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;

use crate::cache::CacheHealthManager;
use crate::clock::Clock;
use crate::config::OfflineSyncConfig;
use crate::executor::{CacheInvalidator, OperationExecutor};
use crate::network::NetworkMonitor;
use crate::queue::MutationQueue;
use crate::status::StatusPublisher;

/// Services a scheduler drives.
pub struct SchedulerContext {
    pub queue: Arc<MutationQueue>,
    pub status: Arc<StatusPublisher>,
    pub network: Arc<NetworkMonitor>,
    /// Read for the memory-only flag when status is recomputed
    pub cache: Arc<CacheHealthManager>,
    pub executor: Arc<dyn OperationExecutor>,
    pub invalidator: Arc<dyn CacheInvalidator>,
    pub clock: Arc<dyn Clock>,
}

/// State shared with the background task.
pub(crate) struct Shared {
    ctx: SchedulerContext,
    batch_size: usize,
    interval: Duration,
    draining: AtomicBool,
    state: watch::Sender<SchedulerState>,
    manual: Notify,
}

struct Running {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<Result<(), SyncError>>,
}

pub struct SyncScheduler {
    shared: Arc<Shared>,
    running: Mutex<Option<Running>>,
}

impl SyncScheduler {
    pub fn new(ctx: SchedulerContext, config: &OfflineSyncConfig) -> Self {
        let (state, _rx) = watch::channel(SchedulerState::Idle);
        Self {
            shared: Arc::new(Shared {
                ctx,
                batch_size: config.batch_size.max(1),
                interval: config.sync_interval().max(Duration::from_millis(1)),
                draining: AtomicBool::new(false),
                state,
                manual: Notify::new(),
            }),
            running: Mutex::new(None),
        }
    }

    /// Get current scheduler state.
    #[must_use]
    pub fn state(&self) -> SchedulerState {
        *self.shared.state.borrow()
    }

    /// Get a receiver to watch state changes.
    #[must_use]
    pub fn state_receiver(&self) -> watch::Receiver<SchedulerState> {
        self.shared.state.subscribe()
    }

    /// Whether the background loop is alive.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running
            .lock()
            .as_ref()
            .is_some_and(|running| !running.handle.is_finished())
    }

    /// Run one drain now and wait for it.
    ///
    /// Returns [`DrainOutcome::Skipped`] if a drain is already in progress.
    pub async fn sync_now(&self) -> Result<DrainOutcome, SyncError> {
        self.shared.drain(DrainTrigger::Manual).await
    }

    /// Ask the background loop for a drain without waiting for it.
    pub fn request_sync(&self) {
        self.shared.manual.notify_one();
    }
}

impl Drop for SyncScheduler {
    fn drop(&mut self) {
        if let Some(running) = self.running.get_mut().take() {
            running.handle.abort();
        }
    }
}
