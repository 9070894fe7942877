// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Quota exceeded writing '{key}': {needed} bytes needed, {available} available")]
    QuotaExceeded {
        key: String,
        needed: usize,
        available: usize,
    },
    #[error("Storage backend error: {0}")]
    Backend(String),
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StorageError {
    /// Short label for metrics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::QuotaExceeded { .. } => "quota",
            Self::Backend(_) => "backend",
            Self::Io(_) => "io",
        }
    }
}

/// Size-limited, synchronous string key/value store.
///
/// Mirrors the browser `localStorage` surface: whole values only, no
/// partial updates, no queries. Everything above this trait goes through
/// [`super::StorageAdapter`], which turns errors into "did not happen".
pub trait KeyValueStore: Send + Sync {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove_item(&self, key: &str) -> Result<(), StorageError>;
}
