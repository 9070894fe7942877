// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! One pass over the queue.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::executor::ExecutorError;
use crate::metrics::LatencyTimer;
use crate::queue::RequeueOutcome;

use super::{DrainOutcome, DrainReport, DrainTrigger, SchedulerState, Shared, SyncError};

/// Executor calls allowed per batch slot in one drain.
const ATTEMPTS_PER_SLOT: usize = 2;

/// Clears the draining flag and returns to `Idle` however the drain ends.
struct DrainGuard<'a> {
    flag: &'a AtomicBool,
    state: &'a watch::Sender<SchedulerState>,
}

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
        self.state.send_replace(SchedulerState::Idle);
    }
}

impl Shared {
    /// Drain up to `batch_size` operations, then publish status.
    #[tracing::instrument(skip_all, fields(trigger = %trigger))]
    pub(crate) async fn drain(&self, trigger: DrainTrigger) -> Result<DrainOutcome, SyncError> {
        if self.draining.swap(true, Ordering::AcqRel) {
            debug!("Drain already in progress, trigger ignored");
            crate::metrics::record_drain_skipped(trigger.as_str());
            return Ok(DrainOutcome::Skipped);
        }
        let _guard = DrainGuard {
            flag: &self.draining,
            state: &self.state,
        };
        self.state.send_replace(SchedulerState::Draining);

        let started = Instant::now();
        let mut report = DrainReport::new(trigger);
        let mut groups: Vec<&'static str> = Vec::new();

        let result = self.drain_batch(&mut report, &mut groups).await;

        if report.processed > 0 {
            self.ctx.status.mark_synced(self.ctx.clock.now_ms());
            debug!(?groups, "Invalidating read caches");
            self.ctx.invalidator.invalidate(&groups).await;
        }
        if let Some(ref last_error) = report.last_error {
            self.ctx.status.record_error(last_error);
        }
        self.publish_status();

        crate::metrics::record_drain(trigger.as_str(), report.processed, report.failed());
        crate::metrics::record_drain_duration(started.elapsed());

        match result {
            Ok(()) => {
                if report.processed > 0 || report.failed() > 0 {
                    info!(
                        processed = report.processed,
                        retried = report.retried,
                        dropped = report.dropped,
                        "Drain complete"
                    );
                } else {
                    debug!("Drain found nothing to do");
                }
                Ok(DrainOutcome::Completed(report))
            }
            Err(e) => {
                error!(error = %e, processed = report.processed, "Drain aborted");
                Err(e)
            }
        }
    }

    async fn drain_batch(
        &self,
        report: &mut DrainReport,
        groups: &mut Vec<&'static str>,
    ) -> Result<(), SyncError> {
        // Failures don't count toward the batch; this bounds the calls
        let attempt_budget = self.batch_size.saturating_mul(ATTEMPTS_PER_SLOT);
        let mut attempted = 0;

        while report.processed < self.batch_size {
            if attempted >= attempt_budget {
                debug!(attempted, processed = report.processed, "Attempt budget spent, ending drain");
                break;
            }
            if !self.ctx.network.is_online() {
                debug!(processed = report.processed, "Went offline mid-drain, stopping");
                break;
            }

            let Some(item) = self.ctx.queue.dequeue()? else {
                break;
            };
            let op_type = item.operation.op_type();
            attempted += 1;

            let result = {
                let _timer = LatencyTimer::new(op_type);
                self.ctx.executor.execute(&item.operation).await
            };

            match result {
                Ok(()) => {
                    report.processed += 1;
                    crate::metrics::record_operation(op_type, "success");
                    let group = item.operation.entity().resource_group();
                    if !groups.contains(&group) {
                        groups.push(group);
                    }
                    debug!(id = %item.id, op_type, "Operation applied");
                }
                Err(ExecutorError::Transient(message)) => {
                    report.last_error = Some(message.clone());
                    match self.ctx.queue.requeue_with_backoff(item, &message) {
                        RequeueOutcome::Requeued { .. } => {
                            report.retried += 1;
                            crate::metrics::record_operation(op_type, "retried");
                        }
                        RequeueOutcome::Dropped { .. } => {
                            report.dropped += 1;
                            crate::metrics::record_operation(op_type, "exhausted");
                        }
                    }
                }
                Err(ExecutorError::Permanent(message)) => {
                    warn!(id = %item.id, op_type, error = %message, "Operation rejected, not retrying");
                    report.last_error = Some(message.clone());
                    report.dropped += 1;
                    crate::metrics::record_operation(op_type, "rejected");
                    self.ctx.queue.drop_item(item, &message);
                }
            }
        }
        Ok(())
    }

    /// Recompute `SyncStatus` from the queue and cache state.
    pub(crate) fn publish_status(&self) {
        self.ctx
            .status
            .recompute(self.ctx.queue.status(), self.ctx.cache.is_memory_only());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheHealthManager;
    use crate::clock::{Clock, ManualClock};
    use crate::config::OfflineSyncConfig;
    use crate::executor::{CacheInvalidator, OperationExecutor};
    use crate::network::NetworkMonitor;
    use crate::queue::{EntityKind, MutationQueue, Operation, Priority};
    use crate::scheduler::{SchedulerContext, SyncScheduler};
    use crate::status::StatusPublisher;
    use crate::storage::{InMemoryStore, StorageAdapter};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::sync::Arc;

    /// Records every operation; fails those whose data says so.
    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<Operation>>,
    }

    #[async_trait]
    impl OperationExecutor for Recorder {
        async fn execute(&self, operation: &Operation) -> Result<(), ExecutorError> {
            self.seen.lock().push(operation.clone());
            match operation {
                Operation::Create { data, .. } if data["fail"] == "transient" => {
                    Err(ExecutorError::transient("503"))
                }
                Operation::Create { data, .. } if data["fail"] == "permanent" => {
                    Err(ExecutorError::permanent("422"))
                }
                _ => Ok(()),
            }
        }
    }

    #[derive(Default)]
    struct Groups(Mutex<Vec<Vec<&'static str>>>);

    #[async_trait]
    impl CacheInvalidator for Groups {
        async fn invalidate(&self, groups: &[&'static str]) {
            self.0.lock().push(groups.to_vec());
        }
    }

    struct Harness {
        scheduler: SyncScheduler,
        queue: Arc<MutationQueue>,
        status: Arc<StatusPublisher>,
        network: Arc<NetworkMonitor>,
        executor: Arc<Recorder>,
        groups: Arc<Groups>,
        clock: Arc<ManualClock>,
    }

    fn harness(batch_size: usize) -> Harness {
        let config = OfflineSyncConfig {
            batch_size,
            ..Default::default()
        };
        let storage = StorageAdapter::new(Arc::new(InMemoryStore::new()));
        let clock = Arc::new(ManualClock::new(1_000_000));
        let queue = Arc::new(MutationQueue::new(storage.clone(), clock.clone(), &config));
        let status = Arc::new(StatusPublisher::new(storage.clone(), config.status_key.clone()));
        let network = Arc::new(NetworkMonitor::new(true));
        let executor = Arc::new(Recorder::default());
        let groups = Arc::new(Groups::default());
        let cache = Arc::new(CacheHealthManager::new(storage, &config));

        let scheduler = SyncScheduler::new(
            SchedulerContext {
                queue: queue.clone(),
                status: status.clone(),
                network: network.clone(),
                cache,
                executor: executor.clone(),
                invalidator: groups.clone(),
                clock: clock.clone(),
            },
            &config,
        );
        Harness { scheduler, queue, status, network, executor, groups, clock }
    }

    fn create(entity: EntityKind, data: serde_json::Value) -> Operation {
        Operation::Create { entity, data }
    }

    #[tokio::test]
    async fn test_drain_processes_in_priority_order() {
        let h = harness(5);
        h.queue.enqueue(create(EntityKind::Workout, json!({"n": "low"})), Priority::Low);
        h.queue.enqueue(create(EntityKind::Workout, json!({"n": "high"})), Priority::High);
        h.queue.enqueue(create(EntityKind::Workout, json!({"n": "medium"})), Priority::Medium);

        let outcome = h.scheduler.sync_now().await.unwrap();
        assert_eq!(outcome.report().unwrap().processed, 3);

        let order: Vec<_> = h
            .executor
            .seen
            .lock()
            .iter()
            .map(|op| match op {
                Operation::Create { data, .. } => data["n"].as_str().unwrap_or_default().to_string(),
                _ => String::new(),
            })
            .collect();
        assert_eq!(order, vec!["high", "low", "medium"]);
        assert!(h.queue.is_empty());
    }

    #[tokio::test]
    async fn test_batch_cap_limits_one_drain() {
        let h = harness(2);
        for i in 0..5 {
            h.queue.enqueue(create(EntityKind::Exercise, json!({ "i": i })), Priority::Medium);
        }

        let report = h.scheduler.sync_now().await.unwrap().report().cloned().unwrap();
        assert_eq!(report.processed, 2);
        assert_eq!(h.queue.len(), 3);
        assert_eq!(h.status.current().pending_operations, 3);
    }

    #[tokio::test]
    async fn test_failure_does_not_abort_batch() {
        let h = harness(5);
        h.queue.enqueue(create(EntityKind::Workout, json!({"fail": "transient"})), Priority::Medium);
        h.queue.enqueue(create(EntityKind::Template, json!({})), Priority::Medium);

        let report = h.scheduler.sync_now().await.unwrap().report().cloned().unwrap();
        assert_eq!(report.processed, 1);
        assert_eq!(report.retried, 1);
        assert_eq!(report.last_error.as_deref(), Some("503"));

        let remaining = h.queue.peek_all();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].attempts, 1);

        let status = h.status.current();
        assert_eq!(status.last_error.as_deref(), Some("503"));
        assert!(status.next_retry.is_some());
        // Backed off, so not pending yet
        assert_eq!(status.pending_operations, 0);
    }

    #[tokio::test]
    async fn test_all_failing_queue_bounded_per_drain() {
        let h = harness(3);
        for _ in 0..20 {
            h.queue.enqueue(create(EntityKind::Workout, json!({"fail": "transient"})), Priority::Medium);
        }

        let report = h.scheduler.sync_now().await.unwrap().report().cloned().unwrap();
        assert_eq!(report.processed, 0);
        assert_eq!(report.retried, 6);
        assert_eq!(h.executor.seen.lock().len(), 6);
        assert_eq!(h.queue.len(), 20);
    }

    #[tokio::test]
    async fn test_permanent_failure_skips_retries() {
        let h = harness(5);
        h.queue.enqueue(create(EntityKind::Workout, json!({"fail": "permanent"})), Priority::Medium);

        let report = h.scheduler.sync_now().await.unwrap().report().cloned().unwrap();
        assert_eq!(report.dropped, 1);
        assert_eq!(report.retried, 0);
        assert!(h.queue.is_empty());
        assert_eq!(h.executor.seen.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_success_marks_sync_and_invalidates_groups_once() {
        let h = harness(5);
        h.queue.enqueue(create(EntityKind::Workout, json!({})), Priority::Medium);
        h.queue.enqueue(create(EntityKind::Workout, json!({})), Priority::Medium);
        h.queue.enqueue(
            Operation::Delete { entity: EntityKind::Template, id: "t1".into() },
            Priority::Medium,
        );

        h.scheduler.sync_now().await.unwrap();

        assert_eq!(h.status.current().last_sync, Some(h.clock.now_ms()));
        assert_eq!(*h.groups.0.lock(), vec![vec!["workouts", "templates"]]);
    }

    #[tokio::test]
    async fn test_no_success_leaves_last_sync_and_skips_invalidation() {
        let h = harness(5);
        h.queue.enqueue(create(EntityKind::Workout, json!({"fail": "transient"})), Priority::Medium);

        h.scheduler.sync_now().await.unwrap();

        assert!(h.status.current().last_sync.is_none());
        assert!(h.groups.0.lock().is_empty());
    }

    #[tokio::test]
    async fn test_offline_drain_touches_nothing() {
        let h = harness(5);
        h.queue.enqueue(create(EntityKind::Workout, json!({})), Priority::Medium);
        h.network.set_online(false);

        let report = h.scheduler.sync_now().await.unwrap().report().cloned().unwrap();
        assert_eq!(report.processed, 0);
        assert!(h.executor.seen.lock().is_empty());
        assert_eq!(h.status.current().pending_operations, 1);
    }

    #[tokio::test]
    async fn test_concurrent_trigger_is_skipped() {
        let h = harness(5);
        // Simulate a drain in flight
        h.scheduler.shared.draining.store(true, Ordering::SeqCst);

        assert_eq!(h.scheduler.sync_now().await.unwrap(), DrainOutcome::Skipped);

        h.scheduler.shared.draining.store(false, Ordering::SeqCst);
        assert!(matches!(h.scheduler.sync_now().await.unwrap(), DrainOutcome::Completed(_)));
        assert_eq!(h.scheduler.state(), SchedulerState::Idle);
    }

    #[tokio::test]
    async fn test_unknown_operation_propagates() {
        let config = OfflineSyncConfig::default();
        let store = Arc::new(InMemoryStore::new());
        crate::storage::KeyValueStore::set_item(
            store.as_ref(),
            &config.queue_key,
            r#"[{"id":"x1","operation":{"type":"archive","payload":{}},"attempts":0,"createdAt":0,"updatedAt":0,"priority":"low"}]"#,
        )
        .unwrap();

        let storage = StorageAdapter::new(store.clone());
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(0));
        let queue = Arc::new(MutationQueue::new(storage.clone(), clock.clone(), &config));
        let scheduler = SyncScheduler::new(
            SchedulerContext {
                queue: queue.clone(),
                status: Arc::new(StatusPublisher::new(storage.clone(), "status")),
                network: Arc::new(NetworkMonitor::new(true)),
                cache: Arc::new(CacheHealthManager::new(storage, &config)),
                executor: Arc::new(Recorder::default()),
                invalidator: Arc::new(crate::executor::NoopInvalidator),
                clock,
            },
            &config,
        );

        let err = scheduler.sync_now().await.unwrap_err();
        assert!(matches!(err, SyncError::Queue(_)));
        // Left in place for a build that understands it
        assert_eq!(queue.len(), 1);
        assert_eq!(scheduler.state(), SchedulerState::Idle);
    }

    #[tokio::test]
    async fn test_half_written_entry_does_not_block_drain() {
        let config = OfflineSyncConfig::default();
        let store = Arc::new(InMemoryStore::new());
        crate::storage::KeyValueStore::set_item(store.as_ref(), &config.queue_key, r#"[{"id":"half-written"}]"#)
            .unwrap();

        let storage = StorageAdapter::new(store.clone());
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(0));
        let queue = Arc::new(MutationQueue::new(storage.clone(), clock.clone(), &config));
        let executor = Arc::new(Recorder::default());
        let scheduler = SyncScheduler::new(
            SchedulerContext {
                queue: queue.clone(),
                status: Arc::new(StatusPublisher::new(storage.clone(), "status")),
                network: Arc::new(NetworkMonitor::new(true)),
                cache: Arc::new(CacheHealthManager::new(storage, &config)),
                executor: executor.clone(),
                invalidator: Arc::new(crate::executor::NoopInvalidator),
                clock,
            },
            &config,
        );
        queue.enqueue(create(EntityKind::Workout, json!({})), Priority::Low);

        let report = scheduler.sync_now().await.unwrap().report().cloned().unwrap();
        assert_eq!(report.processed, 1);
        assert_eq!(executor.seen.lock().len(), 1);
        assert!(queue.is_empty());
    }
}
