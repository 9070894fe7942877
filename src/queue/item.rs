// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Queue item data structures.
//!
//! A [`QueueItem`] wraps one [`Operation`] with the retry bookkeeping the
//! queue needs. The operation itself is a closed tagged union, so executor
//! dispatch is an exhaustive `match`.
//!
//! # Example
//!
//! ```
//! use offline_sync::{EntityKind, Operation, Priority, QueueItem};
//! use serde_json::json;
//!
//! let op = Operation::Update {
//!     entity: EntityKind::Workout,
//!     id: "w-42".into(),
//!     data: json!({"name": "Leg day"}),
//! };
//! assert_eq!(op.op_type(), "update_workout");
//!
//! let item = QueueItem::new(op, Priority::High, 1_700_000_000_000);
//! assert_eq!(item.attempts, 0);
//! assert!(item.is_eligible(1_700_000_000_000));
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Insertion priority. High goes to the front of the queue, the rest append.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Entity kinds an operation can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Workout,
    Template,
    Exercise,
    Profile,
}

impl EntityKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Workout => "workout",
            Self::Template => "template",
            Self::Exercise => "exercise",
            Self::Profile => "profile",
        }
    }

    /// Read-cache group to refresh after operations on this kind land.
    #[must_use]
    pub fn resource_group(&self) -> &'static str {
        match self {
            Self::Workout => "workouts",
            Self::Template => "templates",
            Self::Exercise => "exercises",
            Self::Profile => "profile",
        }
    }
}

/// A user action recorded while (possibly) offline.
///
/// Persisted as `{"type": "...", "payload": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum Operation {
    Create { entity: EntityKind, data: Value },
    Update { entity: EntityKind, id: String, data: Value },
    Delete { entity: EntityKind, id: String },
}

impl Operation {
    /// Persisted `type` tags this build can decode.
    pub const KNOWN_TYPES: [&'static str; 3] = ["create", "update", "delete"];

    #[must_use]
    pub fn is_known_type(tag: &str) -> bool {
        Self::KNOWN_TYPES.contains(&tag)
    }

    #[must_use]
    pub fn entity(&self) -> EntityKind {
        match self {
            Self::Create { entity, .. } | Self::Update { entity, .. } | Self::Delete { entity, .. } => *entity,
        }
    }

    /// Stable tag for logs and metrics, e.g. `delete_template`.
    #[must_use]
    pub fn op_type(&self) -> &'static str {
        use EntityKind::*;
        match (self, self.entity()) {
            (Self::Create { .. }, Workout) => "create_workout",
            (Self::Create { .. }, Template) => "create_template",
            (Self::Create { .. }, Exercise) => "create_exercise",
            (Self::Create { .. }, Profile) => "create_profile",
            (Self::Update { .. }, Workout) => "update_workout",
            (Self::Update { .. }, Template) => "update_template",
            (Self::Update { .. }, Exercise) => "update_exercise",
            (Self::Update { .. }, Profile) => "update_profile",
            (Self::Delete { .. }, Workout) => "delete_workout",
            (Self::Delete { .. }, Template) => "delete_template",
            (Self::Delete { .. }, Exercise) => "delete_exercise",
            (Self::Delete { .. }, Profile) => "delete_profile",
        }
    }
}

/// One pending operation plus retry metadata.
///
/// Only the queue mutates items, and always by rewriting the whole
/// persisted list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueItem {
    /// Unique id (UUID v4) assigned at enqueue
    pub id: String,
    pub operation: Operation,
    /// Failed executions so far
    pub attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    /// Epoch millis
    pub created_at: i64,
    /// Epoch millis
    pub updated_at: i64,
    pub priority: Priority,
    /// Not eligible for dequeue before this epoch-millis instant
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<i64>,
}

impl QueueItem {
    pub fn new(operation: Operation, priority: Priority, now_ms: i64) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            operation,
            attempts: 0,
            last_error: None,
            created_at: now_ms,
            updated_at: now_ms,
            priority,
            retry_after: None,
        }
    }

    /// True when `retry_after` is unset or has passed.
    #[must_use]
    pub fn is_eligible(&self, now_ms: i64) -> bool {
        self.retry_after.map_or(true, |at| at <= now_ms)
    }
}
