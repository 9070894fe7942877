// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Failure-swallowing front for a [`KeyValueStore`].
//!
//! Every storage error is logged and counted, then reported to the caller
//! as "the operation did not happen": a failed read is a miss, a failed
//! write returns `false`. Callers above this layer never see a
//! [`StorageError`](super::StorageError).

use std::sync::Arc;

use tracing::warn;

use super::traits::KeyValueStore;

#[derive(Clone)]
pub struct StorageAdapter {
    inner: Arc<dyn KeyValueStore>,
}

impl StorageAdapter {
    pub fn new(inner: Arc<dyn KeyValueStore>) -> Self {
        Self { inner }
    }

    /// Read a value; failures read as a miss.
    pub fn get(&self, key: &str) -> Option<String> {
        match self.inner.get_item(key) {
            Ok(value) => value,
            Err(e) => {
                warn!(key, error = %e, "Storage read failed, treating as miss");
                crate::metrics::record_storage_error("get", e.kind());
                None
            }
        }
    }

    /// Write a value. Returns whether it was stored.
    pub fn set(&self, key: &str, value: &str) -> bool {
        match self.inner.set_item(key, value) {
            Ok(()) => true,
            Err(e) => {
                warn!(key, bytes = value.len(), error = %e, "Storage write failed, write dropped");
                crate::metrics::record_storage_error("set", e.kind());
                false
            }
        }
    }

    /// Remove a key. Returns whether the removal reached the store.
    pub fn remove(&self, key: &str) -> bool {
        match self.inner.remove_item(key) {
            Ok(()) => true,
            Err(e) => {
                warn!(key, error = %e, "Storage remove failed");
                crate::metrics::record_storage_error("remove", e.kind());
                false
            }
        }
    }
}
