// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Persisted mutation queue and its retry controller.
//!
//! ```text
//! enqueue ──► [ high … | medium/low … ] ──► dequeue (first eligible)
//!                 ▲                               │
//!                 └── requeue_with_backoff ◄──────┘ executor failed
//!                     (front, gated by retry_after; dropped at max_attempts)
//! ```

pub mod backoff;
pub mod item;
pub mod mutation_queue;

pub use backoff::BackoffConfig;
pub use item::{EntityKind, Operation, Priority, QueueItem};
pub use mutation_queue::{MutationQueue, QueueError, QueueStatus, RequeueOutcome};
