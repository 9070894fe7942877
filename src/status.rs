// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Derived sync status and its subscribers.
//!
//! [`SyncStatus`] is never edited field by field from outside: the
//! scheduler recomputes it after each drain and on each connectivity
//! change, and the publisher fans the new value out. Delivery is
//! last-value-wins: a slow watcher sees the latest snapshot, not a backlog.
//!
//! `last_sync` and `is_online` are persisted so they survive restarts.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::queue::QueueStatus;
use crate::storage::StorageAdapter;

/// Snapshot shown to the UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    /// Epoch millis of the last drain that landed at least one operation
    #[serde(default)]
    pub last_sync: Option<i64>,
    pub is_online: bool,
    #[serde(default)]
    pub pending_operations: usize,
    #[serde(default)]
    pub failed_operations: usize,
    /// Epoch millis when the next backed-off item becomes eligible
    #[serde(default)]
    pub next_retry: Option<i64>,
    /// Cache persistence disabled for this session
    #[serde(default)]
    pub memory_only: bool,
    /// Most recent executor failure seen by a drain
    #[serde(default)]
    pub last_error: Option<String>,
}

impl Default for SyncStatus {
    /// Before the first computation: online, nothing pending.
    fn default() -> Self {
        Self {
            last_sync: None,
            is_online: true,
            pending_operations: 0,
            failed_operations: 0,
            next_retry: None,
            memory_only: false,
            last_error: None,
        }
    }
}

type Callback = Arc<dyn Fn(&SyncStatus) + Send + Sync>;
type Registry = Mutex<Vec<(u64, Callback)>>;

/// Handle returned by [`StatusPublisher::on_change`]. Dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes the callback"]
pub struct Subscription {
    id: u64,
    registry: Weak<Registry>,
}

impl Subscription {
    pub fn unsubscribe(self) {
        // Drop does the work
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.lock().retain(|(id, _)| *id != self.id);
        }
    }
}

pub struct StatusPublisher {
    storage: StorageAdapter,
    status_key: String,
    tx: watch::Sender<SyncStatus>,
    callbacks: Arc<Registry>,
    next_id: AtomicU64,
}

impl StatusPublisher {
    /// Restore `last_sync` / `is_online` from storage, if present.
    pub fn new(storage: StorageAdapter, status_key: impl Into<String>) -> Self {
        let status_key = status_key.into();
        let initial = Self::load(&storage, &status_key).unwrap_or_default();
        let (tx, _rx) = watch::channel(initial);
        Self {
            storage,
            status_key,
            tx,
            callbacks: Arc::new(Mutex::new(Vec::new())),
            next_id: AtomicU64::new(0),
        }
    }

    fn load(storage: &StorageAdapter, key: &str) -> Option<SyncStatus> {
        let raw = storage.get(key)?;
        match serde_json::from_str::<SyncStatus>(&raw) {
            Ok(persisted) => Some(SyncStatus {
                last_sync: persisted.last_sync,
                is_online: persisted.is_online,
                ..SyncStatus::default()
            }),
            Err(e) => {
                warn!(key, error = %e, "Sync status document corrupted, wiping");
                crate::metrics::record_corruption("status");
                storage.remove(key);
                None
            }
        }
    }

    #[must_use]
    pub fn current(&self) -> SyncStatus {
        self.tx.borrow().clone()
    }

    /// Watch channel carrying the latest snapshot.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SyncStatus> {
        self.tx.subscribe()
    }

    /// Call `callback` with every recomputed snapshot until the handle drops.
    pub fn on_change<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&SyncStatus) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.callbacks.lock().push((id, Arc::new(callback)));
        Subscription {
            id,
            registry: Arc::downgrade(&self.callbacks),
        }
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.callbacks.lock().len()
    }

    /// Recompute counts from the queue and publish.
    pub fn recompute(&self, queue: QueueStatus, memory_only: bool) {
        self.publish(|status| {
            status.pending_operations = queue.pending;
            status.failed_operations = queue.failed;
            status.next_retry = queue.next_retry;
            status.memory_only = memory_only;
        });
    }

    /// Note a drain that landed at least one operation.
    pub fn mark_synced(&self, at_ms: i64) {
        self.publish(|status| {
            status.last_sync = Some(at_ms);
            status.last_error = None;
        });
    }

    pub fn record_error(&self, error: &str) {
        self.publish(|status| status.last_error = Some(error.to_string()));
    }

    /// Publishes only on an actual transition.
    pub fn set_online(&self, online: bool) {
        if self.tx.borrow().is_online == online {
            return;
        }
        self.publish(|status| status.is_online = online);
    }

    /// Forget everything, including the persisted snapshot.
    pub fn reset(&self, online: bool) {
        self.storage.remove(&self.status_key);
        self.publish(|status| {
            *status = SyncStatus {
                is_online: online,
                ..SyncStatus::default()
            };
        });
    }

    fn publish(&self, update: impl FnOnce(&mut SyncStatus)) {
        self.tx.send_modify(update);
        let snapshot = self.current();

        match serde_json::to_string(&snapshot) {
            Ok(json) => {
                self.storage.set(&self.status_key, &json);
            }
            Err(e) => warn!(error = %e, "Failed to serialize sync status"),
        }

        // Clone out so callbacks may subscribe or unsubscribe re-entrantly
        let callbacks: Vec<Callback> = self.callbacks.lock().iter().map(|(_, cb)| cb.clone()).collect();
        debug!(
            pending = snapshot.pending_operations,
            failed = snapshot.failed_operations,
            online = snapshot.is_online,
            subscribers = callbacks.len(),
            "Sync status published"
        );
        for callback in callbacks {
            callback(&snapshot);
        }
    }
}
