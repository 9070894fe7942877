// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Seams to the remote service and the read cache.
//!
//! The scheduler hands each dequeued [`Operation`] to an
//! [`OperationExecutor`]. Since `Operation` is a closed enum, an executor
//! covers every kind with one exhaustive `match`; a build that adds a kind
//! fails to compile until its executor handles it.
//!
//! After a drain lands at least one operation, the scheduler tells the
//! [`CacheInvalidator`] which resource groups changed.

use async_trait::async_trait;
use thiserror::Error;

use crate::queue::Operation;

/// Why an executor could not apply an operation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecutorError {
    /// Network failure, timeout, 5xx: worth retrying after backoff.
    #[error("transient failure: {0}")]
    Transient(String),
    /// Validation failure, 4xx: retrying cannot help.
    #[error("permanent failure: {0}")]
    Permanent(String),
}

impl ExecutorError {
    pub fn transient(msg: impl Into<String>) -> Self {
        Self::Transient(msg.into())
    }

    pub fn permanent(msg: impl Into<String>) -> Self {
        Self::Permanent(msg.into())
    }

    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// Applies one queued operation to the remote service.
///
/// Timeouts are the executor's business; a hung call stalls that drain.
#[async_trait]
pub trait OperationExecutor: Send + Sync {
    async fn execute(&self, operation: &Operation) -> Result<(), ExecutorError>;
}

/// Refresh hook for dependent read caches.
#[async_trait]
pub trait CacheInvalidator: Send + Sync {
    /// `groups` is deduplicated, e.g. `["workouts", "templates"]`.
    async fn invalidate(&self, groups: &[&'static str]);
}

/// Invalidator for hosts without a read cache.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopInvalidator;

#[async_trait]
impl CacheInvalidator for NoopInvalidator {
    async fn invalidate(&self, _groups: &[&'static str]) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::EntityKind;
    use serde_json::json;

    struct RejectDeletes;

    #[async_trait]
    impl OperationExecutor for RejectDeletes {
        async fn execute(&self, operation: &Operation) -> Result<(), ExecutorError> {
            match operation {
                Operation::Create { .. } | Operation::Update { .. } => Ok(()),
                Operation::Delete { id, .. } => Err(ExecutorError::permanent(format!("cannot delete {}", id))),
            }
        }
    }

    #[tokio::test]
    async fn test_executor_dispatch() {
        let executor = RejectDeletes;
        let create = Operation::Create {
            entity: EntityKind::Template,
            data: json!({}),
        };
        let delete = Operation::Delete {
            entity: EntityKind::Template,
            id: "t9".into(),
        };

        assert!(executor.execute(&create).await.is_ok());
        let err = executor.execute(&delete).await.unwrap_err();
        assert!(!err.is_retryable());
        assert_eq!(err.to_string(), "permanent failure: cannot delete t9");
    }

    #[test]
    fn test_error_classification() {
        assert!(ExecutorError::transient("timeout").is_retryable());
        assert!(!ExecutorError::permanent("422").is_retryable());
    }

    #[tokio::test]
    async fn test_noop_invalidator() {
        NoopInvalidator.invalidate(&["workouts"]).await;
    }
}
