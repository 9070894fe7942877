// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Offline sync coordinator.
//!
//! [`OfflineSync`] is the composition root. It builds every service over
//! one [`KeyValueStore`] and owns their lifecycle:
//! - [`MutationQueue`] with its retry controller
//! - [`SyncScheduler`] driving the injected executor
//! - [`CacheHealthManager`] guarding the read-cache blob
//! - [`StatusPublisher`] fanning out [`SyncStatus`]
//!
//! Nothing here is a global. Build one per signed-in session and call
//! [`reset`](OfflineSync::reset) on logout.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use async_trait::async_trait;
//! use offline_sync::{
//!     EntityKind, ExecutorError, InMemoryStore, OfflineSync, Operation, OperationExecutor, Priority,
//! };
//! use serde_json::json;
//!
//! struct Api;
//!
//! #[async_trait]
//! impl OperationExecutor for Api {
//!     async fn execute(&self, _op: &Operation) -> Result<(), ExecutorError> {
//!         Ok(())
//!     }
//! }
//!
//! # #[tokio::main]
//! # async fn main() {
//! let sync = OfflineSync::builder(Arc::new(InMemoryStore::new()), Arc::new(Api)).build();
//! sync.start().expect("inside a runtime");
//!
//! sync.enqueue(
//!     Operation::Create { entity: EntityKind::Workout, data: json!({"name": "Leg day"}) },
//!     Priority::Medium,
//! );
//! assert_eq!(sync.status().pending_operations, 1);
//!
//! sync.stop().await.expect("clean shutdown");
//! # }
//! ```

mod api;
mod lifecycle;
mod types;

pub use types::HealthCheck;

use std::sync::Arc;

use crate::cache::CacheHealthManager;
use crate::clock::{Clock, SystemClock};
use crate::config::OfflineSyncConfig;
use crate::executor::{CacheInvalidator, NoopInvalidator, OperationExecutor};
use crate::network::NetworkMonitor;
use crate::queue::MutationQueue;
use crate::scheduler::{SchedulerContext, SyncScheduler};
use crate::status::{StatusPublisher, SyncStatus};
use crate::storage::{KeyValueStore, StorageAdapter};

/// Offline durability layer for one session.
pub struct OfflineSync {
    pub(super) config: OfflineSyncConfig,
    pub(super) queue: Arc<MutationQueue>,
    pub(super) status: Arc<StatusPublisher>,
    pub(super) network: Arc<NetworkMonitor>,
    pub(super) cache: Arc<CacheHealthManager>,
    pub(super) scheduler: SyncScheduler,
}

/// Assembles an [`OfflineSync`]. Only the store and executor are required.
pub struct OfflineSyncBuilder {
    store: Arc<dyn KeyValueStore>,
    executor: Arc<dyn OperationExecutor>,
    config: OfflineSyncConfig,
    invalidator: Arc<dyn CacheInvalidator>,
    clock: Arc<dyn Clock>,
    network: Option<Arc<NetworkMonitor>>,
}

impl OfflineSyncBuilder {
    #[must_use]
    pub fn config(mut self, config: OfflineSyncConfig) -> Self {
        self.config = config;
        self
    }

    /// Hook called with the resource groups touched by each successful drain.
    #[must_use]
    pub fn invalidator(mut self, invalidator: Arc<dyn CacheInvalidator>) -> Self {
        self.invalidator = invalidator;
        self
    }

    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Share a monitor the host already feeds. Defaults to a fresh, online one.
    #[must_use]
    pub fn network(mut self, network: Arc<NetworkMonitor>) -> Self {
        self.network = Some(network);
        self
    }

    pub fn build(self) -> OfflineSync {
        let config = self.config;
        let storage = StorageAdapter::new(self.store);

        let queue = Arc::new(MutationQueue::new(storage.clone(), self.clock.clone(), &config));
        let status = Arc::new(StatusPublisher::new(storage.clone(), config.status_key.clone()));
        let cache = Arc::new(CacheHealthManager::new(storage, &config));
        // An explicit monitor wins; otherwise resume from the persisted snapshot
        let network = self
            .network
            .unwrap_or_else(|| Arc::new(NetworkMonitor::new(status.current().is_online)));
        status.set_online(network.is_online());

        let scheduler = SyncScheduler::new(
            SchedulerContext {
                queue: queue.clone(),
                status: status.clone(),
                network: network.clone(),
                cache: cache.clone(),
                executor: self.executor,
                invalidator: self.invalidator,
                clock: self.clock,
            },
            &config,
        );

        let sync = OfflineSync {
            config,
            queue,
            status,
            network,
            cache,
            scheduler,
        };
        // Counts come from the persisted queue left by a previous run
        sync.refresh_status();
        sync
    }
}

impl OfflineSync {
    pub fn builder(store: Arc<dyn KeyValueStore>, executor: Arc<dyn OperationExecutor>) -> OfflineSyncBuilder {
        OfflineSyncBuilder {
            store,
            executor,
            config: OfflineSyncConfig::default(),
            invalidator: Arc::new(NoopInvalidator),
            clock: Arc::new(SystemClock),
            network: None,
        }
    }

    /// Build with defaults apart from `config`.
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        executor: Arc<dyn OperationExecutor>,
        config: OfflineSyncConfig,
    ) -> Self {
        Self::builder(store, executor).config(config).build()
    }

    #[must_use]
    pub fn config(&self) -> &OfflineSyncConfig {
        &self.config
    }

    #[must_use]
    pub fn queue(&self) -> &MutationQueue {
        &self.queue
    }

    #[must_use]
    pub fn cache(&self) -> &CacheHealthManager {
        &self.cache
    }

    #[must_use]
    pub fn network(&self) -> &Arc<NetworkMonitor> {
        &self.network
    }

    #[must_use]
    pub fn scheduler(&self) -> &SyncScheduler {
        &self.scheduler
    }

    /// Current status snapshot.
    #[must_use]
    pub fn status(&self) -> SyncStatus {
        self.status.current()
    }

    pub(super) fn refresh_status(&self) {
        self.status
            .recompute(self.queue.status(), self.cache.is_memory_only());
    }
}
