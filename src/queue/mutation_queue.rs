// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Durable mutation queue.
//!
//! The whole queue is one JSON array under a single storage key. Every
//! mutation reads the full document, changes it in memory and writes it
//! back; a mutex makes each read-modify-write atomic within the process.
//! Nothing is cached between calls, so an enqueue always sees the latest
//! persisted state.
//!
//! Items that no longer decode (an operation tag this build does not know)
//! are carried through every rewrite untouched. [`MutationQueue::dequeue`]
//! reports them as [`QueueError::UnknownOperation`] instead of dropping
//! data written by a newer client.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::clock::Clock;
use crate::config::OfflineSyncConfig;
use crate::storage::StorageAdapter;

use super::backoff::BackoffConfig;
use super::item::{Operation, Priority, QueueItem};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueueError {
    /// A persisted item whose operation this build cannot decode.
    #[error("Unknown operation in queue item '{id}': {reason}")]
    UnknownOperation { id: String, reason: String },
}

/// Snapshot of queue counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStatus {
    /// Items below the attempt limit and eligible now
    pub pending: usize,
    /// Items at or past the attempt limit, plus parked dead letters
    pub failed: usize,
    /// Earliest future `retry_after` among queued items (epoch millis)
    pub next_retry: Option<i64>,
    /// Everything persisted in the queue, eligible or not
    pub total: usize,
}

/// What happened to a failed item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequeueOutcome {
    /// Back in the queue, eligible from `retry_after`
    Requeued { attempts: u32, retry_after: i64 },
    /// Attempts exhausted; removed (and parked if dead letters are enabled)
    Dropped { attempts: u32 },
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
enum Slot {
    Item(QueueItem),
    /// Operation tag from a newer build; kept verbatim
    Undecodable(Value),
}

impl Slot {
    /// `None` for an entry that is simply corrupt.
    fn decode(raw: Value) -> Option<Self> {
        match serde_json::from_value::<QueueItem>(raw.clone()) {
            Ok(item) => Some(Self::Item(item)),
            Err(_) if unknown_operation_tag(&raw).is_some() => Some(Self::Undecodable(raw)),
            Err(e) => {
                let id = raw.get("id").and_then(Value::as_str).unwrap_or("<missing id>");
                warn!(id, error = %e, "Corrupted queue entry, dropping");
                crate::metrics::record_corruption("queue_item");
                None
            }
        }
    }
}

/// The `type` tag of an entry whose operation this build does not know.
fn unknown_operation_tag(raw: &Value) -> Option<&str> {
    raw.as_object()?
        .get("operation")?
        .get("type")?
        .as_str()
        .filter(|tag| !Operation::is_known_type(tag))
}

pub struct MutationQueue {
    storage: StorageAdapter,
    clock: Arc<dyn Clock>,
    backoff: BackoffConfig,
    max_attempts: u32,
    queue_key: String,
    dead_letter_key: String,
    dead_letter_capacity: usize,
    /// Serializes read-modify-write cycles on the persisted documents
    lock: Mutex<()>,
}

impl MutationQueue {
    pub fn new(storage: StorageAdapter, clock: Arc<dyn Clock>, config: &OfflineSyncConfig) -> Self {
        Self {
            storage,
            clock,
            backoff: config.backoff(),
            max_attempts: config.max_attempts.max(1),
            queue_key: config.queue_key.clone(),
            dead_letter_key: config.dead_letter_key.clone(),
            dead_letter_capacity: config.dead_letter_capacity,
            lock: Mutex::new(()),
        }
    }

    /// Override the retry controller (tests use [`BackoffConfig::immediate`]).
    #[must_use]
    pub fn with_backoff(mut self, backoff: BackoffConfig) -> Self {
        self.backoff = backoff;
        self
    }

    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Record an operation. High priority goes to the front, the rest to the back.
    pub fn enqueue(&self, operation: Operation, priority: Priority) -> String {
        let _guard = self.lock.lock();
        let item = QueueItem::new(operation, priority, self.clock.now_ms());
        let id = item.id.clone();
        let op_type = item.operation.op_type();

        let mut slots = self.load_slots();
        match priority {
            Priority::High => slots.insert(0, Slot::Item(item)),
            Priority::Medium | Priority::Low => slots.push(Slot::Item(item)),
        }
        let depth = slots.len();
        if self.save_slots(&slots) {
            debug!(id = %id, op_type, %priority, depth, "Operation enqueued");
        } else {
            warn!(id = %id, op_type, "Operation enqueued but not persisted");
        }

        crate::metrics::record_enqueued(op_type, priority.as_str());
        crate::metrics::set_queue_depth(depth);
        id
    }

    /// Remove and return the first eligible item, scanning front to back.
    ///
    /// Eligibility beats priority: a high-priority item still waiting on
    /// `retry_after` is skipped in favour of an eligible item behind it.
    pub fn dequeue(&self) -> Result<Option<QueueItem>, QueueError> {
        let _guard = self.lock.lock();
        let now = self.clock.now_ms();
        let mut slots = self.load_slots();

        let position = slots.iter().position(|slot| match slot {
            Slot::Item(item) => item.is_eligible(now),
            Slot::Undecodable(_) => true,
        });

        let Some(index) = position else {
            return Ok(None);
        };

        if let Slot::Undecodable(raw) = &slots[index] {
            let id = raw
                .get("id")
                .and_then(Value::as_str)
                .unwrap_or("<missing id>")
                .to_string();
            let reason = describe_undecodable(raw);
            error!(id = %id, reason = %reason, "Queue holds an operation this build cannot execute");
            return Err(QueueError::UnknownOperation { id, reason });
        }

        let Slot::Item(item) = slots.remove(index) else {
            return Ok(None);
        };
        self.save_slots(&slots);
        crate::metrics::set_queue_depth(slots.len());
        debug!(id = %item.id, op_type = item.operation.op_type(), attempts = item.attempts, "Operation dequeued");
        Ok(Some(item))
    }

    /// Record a failure: bump attempts, schedule the retry and put the item
    /// back at the front. Exhausted items are dropped instead.
    pub fn requeue_with_backoff(&self, mut item: QueueItem, error: &str) -> RequeueOutcome {
        let _guard = self.lock.lock();
        let now = self.clock.now_ms();

        item.attempts = item.attempts.saturating_add(1);
        item.last_error = Some(error.to_string());
        item.updated_at = now;

        if item.attempts >= self.max_attempts {
            let attempts = item.attempts;
            error!(
                id = %item.id,
                op_type = item.operation.op_type(),
                attempts,
                error,
                "Operation exhausted its retries, dropping"
            );
            self.park(item);
            return RequeueOutcome::Dropped { attempts };
        }

        let delay = self.backoff.delay(item.attempts);
        let retry_after = now + delay.as_millis() as i64;
        item.retry_after = Some(retry_after);
        let attempts = item.attempts;

        warn!(
            id = %item.id,
            op_type = item.operation.op_type(),
            attempts,
            max_attempts = self.max_attempts,
            error,
            "Operation failed, retrying in {:?}",
            delay
        );

        let mut slots = self.load_slots();
        slots.insert(0, Slot::Item(item));
        self.save_slots(&slots);
        crate::metrics::set_queue_depth(slots.len());

        RequeueOutcome::Requeued { attempts, retry_after }
    }

    /// Drop an item without further retries (non-retryable failure).
    pub fn drop_item(&self, mut item: QueueItem, reason: &str) {
        let _guard = self.lock.lock();
        item.last_error = Some(reason.to_string());
        item.updated_at = self.clock.now_ms();
        error!(
            id = %item.id,
            op_type = item.operation.op_type(),
            attempts = item.attempts,
            reason,
            "Operation failed permanently, dropping"
        );
        self.park(item);
    }

    /// Counts for the status publisher.
    pub fn status(&self) -> QueueStatus {
        let _guard = self.lock.lock();
        let now = self.clock.now_ms();
        let slots = self.load_slots();

        let mut status = QueueStatus {
            total: slots.len(),
            ..Default::default()
        };
        for slot in &slots {
            let Slot::Item(item) = slot else { continue };
            if item.attempts >= self.max_attempts {
                status.failed += 1;
            } else if item.is_eligible(now) {
                status.pending += 1;
            }
            if let Some(at) = item.retry_after.filter(|at| *at > now) {
                status.next_retry = Some(status.next_retry.map_or(at, |cur| cur.min(at)));
            }
        }
        status.failed += self.load_dead_letters().len();
        status
    }

    /// Decodable items in queue order.
    pub fn peek_all(&self) -> Vec<QueueItem> {
        let _guard = self.lock.lock();
        self.load_slots()
            .into_iter()
            .filter_map(|slot| match slot {
                Slot::Item(item) => Some(item),
                Slot::Undecodable(_) => None,
            })
            .collect()
    }

    /// Persisted queue depth, including undecodable entries.
    pub fn len(&self) -> usize {
        let _guard = self.lock.lock();
        self.load_slots().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cancel a queued operation. Returns whether it was found.
    pub fn remove(&self, id: &str) -> bool {
        let _guard = self.lock.lock();
        let mut slots = self.load_slots();
        let before = slots.len();
        slots.retain(|slot| slot_id(slot) != Some(id));
        if slots.len() == before {
            return false;
        }
        self.save_slots(&slots);
        crate::metrics::set_queue_depth(slots.len());
        info!(id, "Operation removed from queue");
        true
    }

    /// Wipe the queue (logout / reset).
    pub fn clear(&self) {
        let _guard = self.lock.lock();
        self.storage.remove(&self.queue_key);
        crate::metrics::set_queue_depth(0);
        info!("Mutation queue cleared");
    }

    /// Parked operations, oldest first. Empty when dead letters are disabled.
    pub fn dead_letters(&self) -> Vec<QueueItem> {
        let _guard = self.lock.lock();
        self.load_dead_letters()
    }

    pub fn clear_dead_letters(&self) {
        let _guard = self.lock.lock();
        self.storage.remove(&self.dead_letter_key);
        crate::metrics::set_dead_letters(0);
    }

    // ── persistence ────────────────────────────────────────────────────

    fn load_slots(&self) -> Vec<Slot> {
        let Some(raw) = self.storage.get(&self.queue_key) else {
            return Vec::new();
        };
        match serde_json::from_str::<Vec<Value>>(&raw) {
            Ok(values) => {
                let total = values.len();
                let slots: Vec<Slot> = values.into_iter().filter_map(Slot::decode).collect();
                if slots.len() != total {
                    self.save_slots(&slots);
                }
                slots
            }
            Err(e) => {
                warn!(key = %self.queue_key, error = %e, bytes = raw.len(), "Queue document corrupted, wiping");
                crate::metrics::record_corruption("queue");
                self.storage.remove(&self.queue_key);
                Vec::new()
            }
        }
    }

    fn save_slots(&self, slots: &[Slot]) -> bool {
        if slots.is_empty() {
            return self.storage.remove(&self.queue_key);
        }
        match serde_json::to_string(slots) {
            Ok(json) => self.storage.set(&self.queue_key, &json),
            Err(e) => {
                error!(error = %e, "Failed to serialize queue");
                false
            }
        }
    }

    fn load_dead_letters(&self) -> Vec<QueueItem> {
        let Some(raw) = self.storage.get(&self.dead_letter_key) else {
            return Vec::new();
        };
        match serde_json::from_str::<Vec<Value>>(&raw) {
            Ok(values) => values
                .into_iter()
                .filter_map(|v| serde_json::from_value(v).ok())
                .collect(),
            Err(e) => {
                warn!(key = %self.dead_letter_key, error = %e, "Dead-letter document corrupted, wiping");
                crate::metrics::record_corruption("dead_letters");
                self.storage.remove(&self.dead_letter_key);
                Vec::new()
            }
        }
    }

    /// Keep an exhausted item for inspection, if dead letters are enabled.
    fn park(&self, item: QueueItem) {
        let op_type = item.operation.op_type();
        if self.dead_letter_capacity == 0 {
            crate::metrics::record_operation(op_type, "dropped");
            return;
        }

        let mut parked = self.load_dead_letters();
        parked.push(item);
        if parked.len() > self.dead_letter_capacity {
            let overflow = parked.len() - self.dead_letter_capacity;
            parked.drain(..overflow);
        }
        match serde_json::to_string(&parked) {
            Ok(json) => {
                self.storage.set(&self.dead_letter_key, &json);
            }
            Err(e) => error!(error = %e, "Failed to serialize dead letters"),
        }
        crate::metrics::record_operation(op_type, "dead_letter");
        crate::metrics::set_dead_letters(parked.len());
    }
}

fn slot_id(slot: &Slot) -> Option<&str> {
    match slot {
        Slot::Item(item) => Some(item.id.as_str()),
        Slot::Undecodable(raw) => raw.get("id").and_then(Value::as_str),
    }
}

fn describe_undecodable(raw: &Value) -> String {
    match unknown_operation_tag(raw) {
        Some(tag) => format!("unknown operation type '{}'", tag),
        None => "undecodable item".to_string(),
    }
}
