// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Metrics instrumentation for offline-sync.
//!
//! Uses the `metrics` crate for backend-agnostic metrics collection.
//! The host application is responsible for choosing the exporter.
//!
//! # Metric Naming Convention
//! - `offline_sync_` prefix for all metrics
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//! - `_bytes` suffix for size gauges
//!
//! # Labels
//! - `op_type`: operation tag, e.g. `create_workout`
//! - `outcome`: success, retry, dropped, dead_letter
//! - `level`: cache pressure level

use metrics::{counter, gauge, histogram};
use std::time::{Duration, Instant};

// ═══════════════════════════════════════════════════════════════════════════
// STORAGE - Swallowed adapter failures
// ═══════════════════════════════════════════════════════════════════════════

/// Record a storage failure that the adapter swallowed
pub fn record_storage_error(operation: &str, kind: &str) {
    counter!(
        "offline_sync_storage_errors_total",
        "operation" => operation.to_string(),
        "kind" => kind.to_string()
    )
    .increment(1);
}

/// Record a persisted document that failed to parse and was wiped
pub fn record_corruption(document: &str) {
    counter!(
        "offline_sync_corruption_detected_total",
        "document" => document.to_string()
    )
    .increment(1);
}

// ═══════════════════════════════════════════════════════════════════════════
// QUEUE - Mutation queue flow
// ═══════════════════════════════════════════════════════════════════════════

/// Record an operation accepted into the queue
pub fn record_enqueued(op_type: &str, priority: &str) {
    counter!(
        "offline_sync_enqueued_total",
        "op_type" => op_type.to_string(),
        "priority" => priority.to_string()
    )
    .increment(1);
}

/// Record the outcome of executing one queued operation
pub fn record_operation(op_type: &str, outcome: &str) {
    counter!(
        "offline_sync_operations_total",
        "op_type" => op_type.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Set current queue depth
pub fn set_queue_depth(count: usize) {
    gauge!("offline_sync_queue_depth").set(count as f64);
}

/// Set parked (dead-lettered) operation count
pub fn set_dead_letters(count: usize) {
    gauge!("offline_sync_dead_letters").set(count as f64);
}

// ═══════════════════════════════════════════════════════════════════════════
// SCHEDULER - Drains and connectivity
// ═══════════════════════════════════════════════════════════════════════════

/// Record a finished drain
pub fn record_drain(trigger: &str, processed: usize, failed: usize) {
    counter!(
        "offline_sync_drains_total",
        "trigger" => trigger.to_string()
    )
    .increment(1);
    counter!("offline_sync_drained_items_total").increment(processed as u64);
    counter!("offline_sync_failed_items_total").increment(failed as u64);
}

/// Record a drain request ignored because another drain was running
pub fn record_drain_skipped(trigger: &str) {
    counter!(
        "offline_sync_drains_skipped_total",
        "trigger" => trigger.to_string()
    )
    .increment(1);
}

/// Record drain duration
pub fn record_drain_duration(duration: Duration) {
    histogram!("offline_sync_drain_seconds").record(duration.as_secs_f64());
}

/// Set network status (1 = online, 0 = offline)
pub fn set_online(online: bool) {
    gauge!("offline_sync_online").set(if online { 1.0 } else { 0.0 });
}

// ═══════════════════════════════════════════════════════════════════════════
// CACHE - Health manager
// ═══════════════════════════════════════════════════════════════════════════

/// Record cache eviction
pub fn record_cache_eviction(level: &str, count: usize, bytes: usize) {
    counter!(
        "offline_sync_cache_evictions_total",
        "level" => level.to_string()
    )
    .increment(count as u64);
    counter!("offline_sync_cache_evicted_bytes_total").increment(bytes as u64);
}

/// Set persisted cache blob size
pub fn set_cache_bytes(bytes: usize) {
    gauge!("offline_sync_cache_bytes").set(bytes as f64);
}

/// Set cache usage ratio (0.0 - 1.0+)
pub fn set_cache_usage(ratio: f64) {
    gauge!("offline_sync_cache_usage").set(ratio);
}

/// Set memory-only mode flag (1 = degraded)
pub fn set_memory_only(memory_only: bool) {
    gauge!("offline_sync_cache_memory_only").set(if memory_only { 1.0 } else { 0.0 });
}

/// Record a cache persist skipped because memory-only mode is active
pub fn record_cache_write_skipped() {
    counter!("offline_sync_cache_writes_skipped_total").increment(1);
}

// ═══════════════════════════════════════════════════════════════════════════
// EXECUTOR - Latency
// ═══════════════════════════════════════════════════════════════════════════

/// Record executor latency
pub fn record_latency(op_type: &str, duration: Duration) {
    histogram!(
        "offline_sync_executor_seconds",
        "op_type" => op_type.to_string()
    )
    .record(duration.as_secs_f64());
}

/// A timing guard that records executor latency on drop
pub struct LatencyTimer {
    op_type: &'static str,
    start: Instant,
}

impl LatencyTimer {
    /// Start a new latency timer
    pub fn new(op_type: &'static str) -> Self {
        Self {
            op_type,
            start: Instant::now(),
        }
    }
}

impl Drop for LatencyTimer {
    fn drop(&mut self) {
        record_latency(self.op_type, self.start.elapsed());
    }
}
