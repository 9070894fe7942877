//! # Offline Sync
//!
//! Offline durability layer for a client that must keep working without a
//! network: user actions are queued durably, replayed when connectivity
//! returns, and the persisted read cache is kept under the storage ceiling.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         Host / UI                           │
//! │  • enqueue() user actions                                  │
//! │  • set_online() from platform events                       │
//! │  • on_sync_status_change() / subscribe()                   │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Mutation Queue                          │
//! │  • One persisted JSON document, rewritten whole            │
//! │  • High priority at the front, FIFO otherwise              │
//! │  • Exponential backoff + jitter, poison pill at 3 tries    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!            (timer tick / online edge / manual trigger)
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  Background Sync Scheduler                  │
//! │  • One drain at a time, at most batch_size successes       │
//! │  • OperationExecutor per item, CacheInvalidator after      │
//! │  • Recomputes SyncStatus after every drain                 │
//! └─────────────────────────────────────────────────────────────┘
//!
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   Cache Health Manager                      │
//! │  • Checks blob size before every persist                   │
//! │  • 80% / 90%: evict oldest 20% / 30%                       │
//! │  • 95% or quota error: wipe, memory-only until reset       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every persisted document sits behind a [`StorageAdapter`], which turns
//! storage failures into logged misses so none of them reach the caller.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use async_trait::async_trait;
//! use offline_sync::{
//!     EntityKind, ExecutorError, FileStore, OfflineSync, OfflineSyncConfig, Operation,
//!     OperationExecutor, Priority,
//! };
//! use serde_json::json;
//!
//! struct RemoteApi;
//!
//! #[async_trait]
//! impl OperationExecutor for RemoteApi {
//!     async fn execute(&self, operation: &Operation) -> Result<(), ExecutorError> {
//!         match operation {
//!             Operation::Create { .. } => Ok(()),
//!             Operation::Update { .. } => Ok(()),
//!             Operation::Delete { .. } => Err(ExecutorError::transient("503")),
//!         }
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let store = Arc::new(FileStore::open("./offline-data").expect("data dir"));
//!     let sync = OfflineSync::new(store, Arc::new(RemoteApi), OfflineSyncConfig::default());
//!
//!     let _subscription = sync.on_sync_status_change(|status| {
//!         println!("pending={} online={}", status.pending_operations, status.is_online);
//!     });
//!
//!     sync.start().expect("Failed to start");
//!     sync.enqueue(
//!         Operation::Create { entity: EntityKind::Workout, data: json!({"name": "Push day"}) },
//!         Priority::High,
//!     );
//!
//!     sync.set_online(false);
//!     sync.set_online(true); // drains immediately
//!
//!     sync.stop().await.expect("Failed to stop");
//! }
//! ```
//!
//! ## Configuration
//!
//! See [`OfflineSyncConfig`] for all configuration options.
//!
//! ## Modules
//!
//! - [`coordinator`]: [`OfflineSync`], the composition root
//! - [`queue`]: persisted mutation queue and retry controller
//! - [`scheduler`]: drain loop and its triggers
//! - [`cache`]: read-cache health manager
//! - [`status`]: derived [`SyncStatus`] and subscriptions
//! - [`storage`]: key-value backends and the failure-swallowing adapter
//! - [`executor`]: seams to the remote service and read cache
//! - [`network`]: connectivity signal

pub mod cache;
pub mod clock;
pub mod config;
pub mod coordinator;
pub mod executor;
pub mod metrics;
pub mod network;
pub mod queue;
pub mod scheduler;
pub mod status;
pub mod storage;

pub use cache::{
    CacheEntry, CacheHealth, CacheHealthManager, CachePressure, CacheStats, CacheThresholds,
    DegradeReason, EvictionStrategy, PersistOutcome, PersistedCache,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::OfflineSyncConfig;
pub use coordinator::{HealthCheck, OfflineSync, OfflineSyncBuilder};
pub use executor::{CacheInvalidator, ExecutorError, NoopInvalidator, OperationExecutor};
pub use network::NetworkMonitor;
pub use queue::{
    BackoffConfig, EntityKind, MutationQueue, Operation, Priority, QueueError, QueueItem,
    QueueStatus, RequeueOutcome,
};
pub use scheduler::{
    DrainOutcome, DrainReport, DrainTrigger, SchedulerContext, SchedulerState, SyncError, SyncScheduler,
};
pub use status::{StatusPublisher, Subscription, SyncStatus};
pub use storage::{FileStore, InMemoryStore, KeyValueStore, StorageAdapter, StorageError};
pub use metrics::LatencyTimer;
