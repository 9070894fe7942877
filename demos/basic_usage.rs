// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Basic usage of the offline sync layer.
//!
//! Walks through a session: queue actions while offline, come back online,
//! watch a flaky call retry, then push the read cache past its ceiling.
//!
//! Run with: `cargo run --example basic_usage`

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use metrics_util::debugging::{DebugValue, DebuggingRecorder, Snapshotter};
use offline_sync::{
    CacheEntry, CacheInvalidator, EntityKind, ExecutorError, FileStore, OfflineSync,
    OfflineSyncConfig, Operation, OperationExecutor, PersistedCache, Priority,
};
use serde_json::json;

/// Remote API that fails the first call it sees, then accepts everything.
struct DemoApi {
    calls: AtomicUsize,
}

#[async_trait]
impl OperationExecutor for DemoApi {
    async fn execute(&self, operation: &Operation) -> Result<(), ExecutorError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call == 0 {
            println!("   ⚠️  {} -> 503 (will retry)", operation.op_type());
            return Err(ExecutorError::transient("503 Service Unavailable"));
        }
        match operation {
            Operation::Delete { id, .. } if id == "locked" => {
                println!("   ❌ {} -> 422", operation.op_type());
                Err(ExecutorError::permanent("422 Unprocessable Entity"))
            }
            _ => {
                println!("   ✓ {} -> 200", operation.op_type());
                Ok(())
            }
        }
    }
}

struct PrintingInvalidator;

#[async_trait]
impl CacheInvalidator for PrintingInvalidator {
    async fn invalidate(&self, groups: &[&'static str]) {
        println!("   🔄 Invalidated: {:?}", groups);
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder.install().expect("failed to install metrics recorder");

    tracing_subscriber::fmt().with_target(false).compact().init();

    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║                 Offline Sync: Basic Usage Demo                ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    // ─────────────────────────────────────────────────────────────────────
    // 1. Build over a file store
    // ─────────────────────────────────────────────────────────────────────
    let data_dir = std::env::temp_dir().join("offline-sync-demo");
    let store = Arc::new(FileStore::open(&data_dir)?);
    let config = OfflineSyncConfig {
        sync_interval_ms: 5_000,
        backoff_base_ms: 200,
        backoff_jitter_ms: 100,
        cache_max_bytes: 64 * 1024,
        dead_letter_capacity: 10,
        ..Default::default()
    };

    let sync = OfflineSync::builder(store, Arc::new(DemoApi { calls: AtomicUsize::new(0) }))
        .config(config)
        .invalidator(Arc::new(PrintingInvalidator))
        .build();
    sync.reset();

    println!("📁 Data directory: {}", data_dir.display());

    let _subscription = sync.on_sync_status_change(|status| {
        println!(
            "   📣 status: online={} pending={} failed={} memory_only={}",
            status.is_online, status.pending_operations, status.failed_operations, status.memory_only
        );
    });

    // ─────────────────────────────────────────────────────────────────────
    // 2. Queue work while offline
    // ─────────────────────────────────────────────────────────────────────
    println!("\n📴 Going offline and queueing actions...");
    sync.set_online(false);
    sync.enqueue(
        Operation::Create { entity: EntityKind::Workout, data: json!({"name": "Push day"}) },
        Priority::Low,
    );
    sync.enqueue(
        Operation::Update { entity: EntityKind::Profile, id: "me".into(), data: json!({"unit": "kg"}) },
        Priority::High,
    );
    sync.enqueue(
        Operation::Delete { entity: EntityKind::Template, id: "locked".into() },
        Priority::Medium,
    );

    for item in sync.pending() {
        println!("   • [{}] {}", item.priority, item.operation.op_type());
    }

    // ─────────────────────────────────────────────────────────────────────
    // 3. Back online: the background loop drains
    // ─────────────────────────────────────────────────────────────────────
    println!("\n📶 Starting scheduler and going online...");
    sync.start()?;
    sync.set_online(true);
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;

    // Let the backed-off item become eligible, then drain by hand.
    tokio::time::sleep(std::time::Duration::from_millis(400)).await;
    println!("\n🔁 Manual sync...");
    let outcome = sync.sync_now().await?;
    if let Some(report) = outcome.report() {
        println!("   {}", report);
    }

    println!("\n💀 Dead letters: {}", sync.dead_letters().len());
    for item in sync.dead_letters() {
        println!("   • {} ({} attempts)", item.operation.op_type(), item.attempts);
    }

    // ─────────────────────────────────────────────────────────────────────
    // 4. Read cache under pressure
    // ─────────────────────────────────────────────────────────────────────
    println!("\n🗄️  Persisting read cache...");
    let small = PersistedCache::new(
        0,
        (0..10)
            .map(|i| CacheEntry::new(format!("[\"workouts\",{}]", i), i, json!("x".repeat(1_000))))
            .collect(),
    );
    println!("   10 KB cache -> {:?}", sync.persist_cache(&small));

    let crowded = PersistedCache::new(
        0,
        (0..55)
            .map(|i| CacheEntry::new(format!("[\"workouts\",{}]", i), i, json!("x".repeat(1_000))))
            .collect(),
    );
    println!("   55 KB cache -> {:?}", sync.persist_cache(&crowded));

    let huge = PersistedCache::new(
        0,
        vec![CacheEntry::new("[\"exercises\"]", 0, json!("x".repeat(70_000)))],
    );
    println!("   70 KB cache -> {:?}", sync.persist_cache(&huge));
    println!("   restored entries: {:?}", sync.restore_cache().map(|c| c.len()));

    // ─────────────────────────────────────────────────────────────────────
    // 5. Health and shutdown
    // ─────────────────────────────────────────────────────────────────────
    println!("\n🩺 {}", sync.health_check());

    sync.stop().await?;
    println!("\n🛑 Scheduler stopped");

    println!("\n📊 Metrics:");
    dump_metrics(&snapshotter);

    println!("\n✅ Demo complete!");
    Ok(())
}

fn dump_metrics(snapshotter: &Snapshotter) {
    let snapshot = snapshotter.snapshot();
    let mut counters = Vec::new();
    let mut gauges = Vec::new();
    let mut histograms = Vec::new();

    for (composite_key, _, _, value) in snapshot.into_vec() {
        let (_, key) = composite_key.into_parts();
        let name = key.name().to_string();
        let labels: Vec<String> = key
            .labels()
            .map(|label| format!("{}={}", label.key(), label.value()))
            .collect();
        let labels = if labels.is_empty() {
            String::new()
        } else {
            format!("{{{}}}", labels.join(", "))
        };

        match value {
            DebugValue::Counter(v) => counters.push((name, labels, v)),
            DebugValue::Gauge(v) => gauges.push((name, labels, v.into_inner())),
            DebugValue::Histogram(samples) => {
                let values: Vec<f64> = samples.iter().map(|s| s.into_inner()).collect();
                let count = values.len();
                let sum: f64 = values.iter().sum();
                let avg = if count > 0 { sum / count as f64 } else { 0.0 };
                let min = values.iter().copied().fold(f64::INFINITY, f64::min);
                let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                histograms.push((name, labels, count, sum, avg, min, max));
            }
        }
    }

    counters.sort_by(|a, b| a.0.cmp(&b.0));
    gauges.sort_by(|a, b| a.0.cmp(&b.0));
    histograms.sort_by(|a, b| a.0.cmp(&b.0));

    if !counters.is_empty() {
        println!("   ┌─ Counters (cumulative)");
        for (name, labels, value) in &counters {
            println!("   │  └─ {}{} = {}", name, labels, value);
        }
    }

    if !gauges.is_empty() {
        println!("   ├─ Gauges (current value)");
        for (name, labels, value) in &gauges {
            println!("   │  └─ {}{} = {:.2}", name, labels, value);
        }
    }

    if !histograms.is_empty() {
        println!("   └─ Histograms (distributions)");
        for (name, labels, count, sum, avg, min, max) in &histograms {
            if *min == f64::INFINITY {
                println!("   │  └─ {}{} = (no samples)", name, labels);
            } else {
                println!("   │  └─ {}{}", name, labels);
                println!(
                    "   │     count={} sum={:.4} avg={:.4} min={:.4} max={:.4}",
                    count, sum, avg, min, max
                );
            }
        }
    }

    if counters.is_empty() && gauges.is_empty() && histograms.is_empty() {
        println!("   └─ (no metrics recorded)");
    }
}
