// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Public types for the sync scheduler.

use thiserror::Error;

use crate::queue::QueueError;

/// Scheduler state. Only one drain runs at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Waiting for a trigger
    Idle,
    /// A drain is in progress; further triggers are ignored
    Draining,
}

impl std::fmt::Display for SchedulerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Draining => write!(f, "Draining"),
        }
    }
}

/// What woke the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainTrigger {
    /// `start()` while online
    Startup,
    /// Periodic timer tick
    Timer,
    /// Offline → online transition
    Online,
    /// Explicit request from the host
    Manual,
}

impl DrainTrigger {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Startup => "startup",
            Self::Timer => "timer",
            Self::Online => "online",
            Self::Manual => "manual",
        }
    }
}

impl std::fmt::Display for DrainTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tally of one drain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrainReport {
    pub trigger: DrainTrigger,
    /// Operations the executor applied
    pub processed: usize,
    /// Failures put back with backoff
    pub retried: usize,
    /// Failures removed for good (exhausted or permanent)
    pub dropped: usize,
    /// Last executor error seen during this drain
    pub last_error: Option<String>,
}

impl DrainReport {
    pub(crate) fn new(trigger: DrainTrigger) -> Self {
        Self {
            trigger,
            processed: 0,
            retried: 0,
            dropped: 0,
            last_error: None,
        }
    }

    /// Executor failures of either kind
    #[must_use]
    pub fn failed(&self) -> usize {
        self.retried + self.dropped
    }

    /// Check if every attempted operation landed
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }
}

impl std::fmt::Display for DrainReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Drain({}: processed={}, retried={}, dropped={})",
            self.trigger, self.processed, self.retried, self.dropped
        )
    }
}

/// Result of asking for a drain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrainOutcome {
    Completed(DrainReport),
    /// Another drain was already running
    Skipped,
}

impl DrainOutcome {
    /// The report, if this call actually drained.
    #[must_use]
    pub fn report(&self) -> Option<&DrainReport> {
        match self {
            Self::Completed(report) => Some(report),
            Self::Skipped => None,
        }
    }
}

/// Errors that stop a drain. Executor and storage failures never show up
/// here; they are handled by retry, drop, or local recovery.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SyncError {
    /// The queue holds an operation this build cannot decode
    #[error(transparent)]
    Queue(#[from] QueueError),

    /// `start()` was called outside a Tokio runtime
    #[error("No Tokio runtime available to run the sync loop")]
    NoRuntime,

    /// The background loop panicked or was aborted
    #[error("Sync loop terminated abnormally: {0}")]
    TaskFailed(String),
}
