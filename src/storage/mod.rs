// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Storage backends and the failure-swallowing adapter in front of them.
//!
//! - [`traits`]: [`KeyValueStore`] and [`StorageError`]
//! - [`memory`]: in-process store with quota and fault injection
//! - [`file`]: one-file-per-key directory store
//! - [`adapter`]: [`StorageAdapter`], the only storage surface the rest of the crate uses

pub mod adapter;
pub mod file;
pub mod memory;
pub mod traits;

pub use adapter::StorageAdapter;
pub use file::FileStore;
pub use memory::InMemoryStore;
pub use traits::{KeyValueStore, StorageError};
