//! Chaos Testing for the offline sync layer
//!
//! This module tests failure scenarios using:
//! 1. **FailingStore wrapper** - storage errors injected at specific call counts
//! 2. **Quota limits** - a store that refuses writes past a byte budget
//! 3. **Data corruption** - garbage in every persisted document
//! 4. **Lifecycle abuse** - double start, stop without start, rapid cycles
//!
//! # Running Chaos Tests
//! ```bash
//! cargo test --test chaos -- --nocapture
//! ```

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use offline_sync::{
    CacheEntry, CachePressure, DegradeReason, EntityKind, ExecutorError, InMemoryStore,
    KeyValueStore, ManualClock, OfflineSync, OfflineSyncConfig, Operation, OperationExecutor,
    PersistOutcome, PersistedCache, Priority, StorageError, SyncError,
};

// =============================================================================
// Failing Store Wrapper - Precise Error Injection
// =============================================================================

/// Wraps an [`InMemoryStore`] and fails selected calls.
pub struct FailingStore {
    inner: InMemoryStore,
    call_count: AtomicU64,
    /// Fail every call whose 1-indexed number is a multiple of this (0 = never)
    fail_every: AtomicU64,
    /// Fail every call while set
    fail_all: AtomicBool,
}

impl FailingStore {
    pub fn new() -> Self {
        Self {
            inner: InMemoryStore::new(),
            call_count: AtomicU64::new(0),
            fail_every: AtomicU64::new(0),
            fail_all: AtomicBool::new(false),
        }
    }

    /// Fail calls n, 2n, 3n, ...
    pub fn fail_every(n: u64) -> Self {
        let store = Self::new();
        store.fail_every.store(n, Ordering::SeqCst);
        store
    }

    pub fn heal(&self) {
        self.fail_every.store(0, Ordering::SeqCst);
        self.fail_all.store(false, Ordering::SeqCst);
    }

    pub fn break_all(&self) {
        self.fail_all.store(true, Ordering::SeqCst);
    }

    fn maybe_fail(&self) -> Result<(), StorageError> {
        let count = self.call_count.fetch_add(1, Ordering::SeqCst) + 1;
        let every = self.fail_every.load(Ordering::SeqCst);
        if self.fail_all.load(Ordering::SeqCst) || (every > 0 && count % every == 0) {
            Err(StorageError::Backend(format!("injected failure on call {}", count)))
        } else {
            Ok(())
        }
    }
}

impl KeyValueStore for FailingStore {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.maybe_fail()?;
        self.inner.get_item(key)
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.maybe_fail()?;
        self.inner.set_item(key, value)
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        self.maybe_fail()?;
        self.inner.remove_item(key)
    }
}

// =============================================================================
// Helpers
// =============================================================================

#[derive(Default)]
struct CountingApi(AtomicUsize);

#[async_trait]
impl OperationExecutor for CountingApi {
    async fn execute(&self, _operation: &Operation) -> Result<(), ExecutorError> {
        self.0.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn workout(n: usize) -> Operation {
    Operation::Create { entity: EntityKind::Workout, data: json!({ "n": n }) }
}

fn build(store: Arc<dyn KeyValueStore>, api: Arc<CountingApi>, config: OfflineSyncConfig) -> OfflineSync {
    OfflineSync::builder(store, api)
        .config(config)
        .clock(Arc::new(ManualClock::new(0)))
        .build()
}

fn cache_of(count: usize, payload: usize) -> PersistedCache {
    let entries = (0..count)
        .map(|i| CacheEntry::new(format!("[\"q\",{}]", i), i as i64, json!("x".repeat(payload))))
        .collect();
    PersistedCache::new(0, entries)
}

// =============================================================================
// Storage Faults
// =============================================================================

#[tokio::test]
async fn chaos_storage_down_never_reaches_caller() {
    let store = Arc::new(FailingStore::new());
    store.break_all();
    let api = Arc::new(CountingApi::default());
    let sync = build(store.clone(), api.clone(), OfflineSyncConfig::default());

    // Every call below swallows the failure
    let id = sync.enqueue(workout(1), Priority::High);
    assert_eq!(id.len(), 36);
    let report = sync.sync_now().await.unwrap().report().cloned().unwrap();
    assert_eq!(report.processed, 0);
    assert!(sync.restore_cache().is_none());
    assert!(!sync.cache_health().corrupted);
    sync.reset();

    assert_eq!(api.0.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn chaos_flaky_storage_converges_once_healed() {
    let store = Arc::new(FailingStore::fail_every(3));
    let api = Arc::new(CountingApi::default());
    let sync = build(store.clone(), api.clone(), OfflineSyncConfig::default());

    for n in 0..10 {
        sync.enqueue(workout(n), Priority::Medium);
    }
    for _ in 0..5 {
        sync.sync_now().await.unwrap();
    }

    store.heal();
    for _ in 0..10 {
        sync.sync_now().await.unwrap();
    }

    assert!(sync.queue().is_empty());
    assert_eq!(sync.status().pending_operations, 0);
}

#[tokio::test]
async fn chaos_queue_write_over_quota_is_swallowed() {
    let store = Arc::new(InMemoryStore::with_quota(300));
    let api = Arc::new(CountingApi::default());
    let sync = build(store.clone(), api, OfflineSyncConfig::default());

    let big = Operation::Create {
        entity: EntityKind::Template,
        data: json!({ "notes": "x".repeat(1_000) }),
    };
    sync.enqueue(big, Priority::Medium);

    // Not persisted, but nothing blew up
    assert!(sync.queue().is_empty());
    assert!(store.used_bytes() <= 300);
}

// =============================================================================
// Cache Pressure
// =============================================================================

#[tokio::test]
async fn chaos_cache_between_aggressive_and_critical_trims_thirty_percent() {
    let store = Arc::new(InMemoryStore::new());
    let config = OfflineSyncConfig {
        cache_max_bytes: 5_000_000,
        ..Default::default()
    };
    let sync = build(store, Arc::new(CountingApi::default()), config);

    // 100 entries of ~46KB: about 4.6MB, 92% of the ceiling
    let cache = cache_of(100, 46_000);
    match sync.persist_cache(&cache) {
        PersistOutcome::Written { evicted, .. } => {
            assert_eq!(evicted.len(), 30);
            // Oldest first
            assert_eq!(evicted[0], "[\"q\",0]");
            assert_eq!(evicted[29], "[\"q\",29]");
        }
        other => panic!("expected a trimmed write, got {:?}", other),
    }
    assert!(!sync.cache().is_memory_only());
    assert_eq!(sync.restore_cache().unwrap().len(), 70);
}

#[tokio::test]
async fn chaos_cache_quota_rejection_enters_memory_only() {
    let store = Arc::new(InMemoryStore::with_quota(1_000));
    let config = OfflineSyncConfig {
        cache_max_bytes: 1_000_000,
        ..Default::default()
    };
    let sync = build(store, Arc::new(CountingApi::default()), config);

    assert_eq!(
        sync.persist_cache(&cache_of(5, 500)),
        PersistOutcome::Degraded { reason: DegradeReason::WriteRejected }
    );
    assert!(sync.status().memory_only);
    assert_eq!(sync.persist_cache(&cache_of(1, 1)), PersistOutcome::Skipped);

    sync.reset();
    assert!(matches!(sync.persist_cache(&cache_of(1, 1)), PersistOutcome::Written { .. }));
}

#[tokio::test]
async fn chaos_cache_critical_reported_by_health_check() {
    let store = Arc::new(InMemoryStore::new());
    let config = OfflineSyncConfig {
        cache_max_bytes: 1_000,
        ..Default::default()
    };
    let sync = build(store, Arc::new(CountingApi::default()), config);

    let outcome = sync.persist_cache(&cache_of(3, 400));
    assert_eq!(outcome, PersistOutcome::Degraded { reason: DegradeReason::CriticalSize });

    let health = sync.health_check();
    assert!(!health.is_healthy());
    assert!(health.cache.memory_only);
    assert_eq!(health.cache.level, CachePressure::Normal);
}

// =============================================================================
// Data Corruption
// =============================================================================

#[tokio::test]
async fn chaos_corrupted_queue_document_is_wiped() {
    let store = Arc::new(InMemoryStore::new());
    let config = OfflineSyncConfig::default();
    store.set_item(&config.queue_key, "{\"not\": \"a list\"").unwrap();
    let api = Arc::new(CountingApi::default());
    let sync = build(store.clone(), api.clone(), config.clone());

    assert_eq!(sync.status().pending_operations, 0);
    assert!(store.get_item(&config.queue_key).unwrap().is_none());

    sync.enqueue(workout(1), Priority::Medium);
    sync.sync_now().await.unwrap();
    assert_eq!(api.0.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn chaos_corrupted_cache_blob_reported_unhealthy() {
    let store = Arc::new(InMemoryStore::new());
    let config = OfflineSyncConfig::default();
    store.set_item(&config.cache_key, "{\"timestamp\":1,\"entries\":[{\"queryKey\":").unwrap();
    let sync = build(store.clone(), Arc::new(CountingApi::default()), config.clone());

    let health = sync.cache_health();
    assert!(!health.healthy);
    assert!(health.corrupted);
    assert!(store.get_item(&config.cache_key).unwrap().is_none());
    assert!(sync.restore_cache().is_none());
}

#[tokio::test]
async fn chaos_unknown_operation_stops_background_loop() {
    let store = Arc::new(InMemoryStore::new());
    let config = OfflineSyncConfig::default();
    store
        .set_item(
            &config.queue_key,
            r#"[{"id":"from-newer-build","operation":{"type":"archive","payload":{"id":"w1"}},"attempts":0,"createdAt":0,"updatedAt":0,"priority":"medium"}]"#,
        )
        .unwrap();
    let api = Arc::new(CountingApi::default());
    let sync = build(store.clone(), api.clone(), config.clone());

    sync.start().unwrap();
    for _ in 0..20 {
        if !sync.is_running() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let err = sync.stop().await.unwrap_err();
    assert!(matches!(err, SyncError::Queue(_)));
    assert!(err.to_string().contains("from-newer-build"));
    // Untouched for a build that understands it
    assert_eq!(sync.queue().len(), 1);
    assert_eq!(api.0.load(Ordering::SeqCst), 0);
}

// =============================================================================
// Lifecycle Abuse
// =============================================================================

#[tokio::test]
async fn chaos_double_start() {
    let sync = build(
        Arc::new(InMemoryStore::new()),
        Arc::new(CountingApi::default()),
        OfflineSyncConfig::default(),
    );
    sync.start().unwrap();
    sync.start().unwrap();
    assert!(sync.is_running());
    sync.stop().await.unwrap();
}

#[tokio::test]
async fn chaos_stop_without_start() {
    let sync = build(
        Arc::new(InMemoryStore::new()),
        Arc::new(CountingApi::default()),
        OfflineSyncConfig::default(),
    );
    sync.stop().await.unwrap();
    assert!(!sync.is_running());
}

#[tokio::test]
async fn chaos_rapid_start_stop_cycles() {
    let api = Arc::new(CountingApi::default());
    let sync = build(Arc::new(InMemoryStore::new()), api.clone(), OfflineSyncConfig::default());

    for n in 0..20 {
        sync.enqueue(workout(n), Priority::Low);
        sync.start().unwrap();
        tokio::task::yield_now().await;
        sync.stop().await.unwrap();
    }

    sync.sync_now().await.unwrap();
    for _ in 0..5 {
        sync.sync_now().await.unwrap();
    }
    assert!(sync.queue().is_empty());
    assert_eq!(api.0.load(Ordering::SeqCst), 20);
}
