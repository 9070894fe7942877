// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

use std::sync::atomic::{AtomicBool, Ordering};

use dashmap::DashMap;

use super::traits::{KeyValueStore, StorageError};

/// In-process key/value store with an optional byte quota.
///
/// The quota counts key and value lengths, which is how browser storage
/// accounts usage. Read and write faults can be switched on to exercise
/// the failure-swallowing paths.
pub struct InMemoryStore {
    data: DashMap<String, String>,
    quota_bytes: Option<usize>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            data: DashMap::new(),
            quota_bytes: None,
            fail_reads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
        }
    }

    /// Store that rejects writes once `quota_bytes` would be exceeded.
    #[must_use]
    pub fn with_quota(quota_bytes: usize) -> Self {
        Self {
            quota_bytes: Some(quota_bytes),
            ..Self::new()
        }
    }

    /// Get current key count
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Bytes in use (keys + values)
    #[must_use]
    pub fn used_bytes(&self) -> usize {
        self.data.iter().map(|e| e.key().len() + e.value().len()).sum()
    }

    /// Make every read fail until switched off
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make every write and remove fail until switched off
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Clear all keys
    pub fn clear(&self) {
        self.data.clear();
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyValueStore for InMemoryStore {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StorageError::Backend(format!("injected read failure for '{}'", key)));
        }
        Ok(self.data.get(key).map(|r| r.value().clone()))
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Backend(format!("injected write failure for '{}'", key)));
        }

        if let Some(quota) = self.quota_bytes {
            let used_elsewhere: usize = self
                .data
                .iter()
                .filter(|e| e.key() != key)
                .map(|e| e.key().len() + e.value().len())
                .sum();
            let needed = key.len() + value.len();
            let available = quota.saturating_sub(used_elsewhere);
            if needed > available {
                return Err(StorageError::QuotaExceeded {
                    key: key.to_string(),
                    needed,
                    available,
                });
            }
        }

        self.data.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Backend(format!("injected remove failure for '{}'", key)));
        }
        self.data.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_store_is_empty() {
        let store = InMemoryStore::new();
        assert!(store.is_empty());
        assert_eq!(store.len(), 0);
        assert_eq!(store.used_bytes(), 0);
    }

    #[test]
    fn test_set_and_get() {
        let store = InMemoryStore::new();
        store.set_item("k", "value").unwrap();
        assert_eq!(store.get_item("k").unwrap().as_deref(), Some("value"));
        assert_eq!(store.used_bytes(), 6);
    }

    #[test]
    fn test_get_missing_returns_none() {
        let store = InMemoryStore::new();
        assert!(store.get_item("missing").unwrap().is_none());
    }

    #[test]
    fn test_remove_missing_is_ok() {
        let store = InMemoryStore::new();
        assert!(store.remove_item("missing").is_ok());
    }

    #[test]
    fn test_set_overwrites() {
        let store = InMemoryStore::new();
        store.set_item("k", "one").unwrap();
        store.set_item("k", "two").unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.get_item("k").unwrap().as_deref(), Some("two"));
    }

    #[test]
    fn test_quota_rejects_oversized_write() {
        let store = InMemoryStore::with_quota(10);
        store.set_item("a", "1234").unwrap(); // 5 bytes

        let err = store.set_item("b", "123456").unwrap_err(); // 7 bytes, only 5 left
        assert!(matches!(err, StorageError::QuotaExceeded { needed: 7, available: 5, .. }));
        assert_eq!(err.kind(), "quota");

        // Replacing an existing key only counts the new value
        store.set_item("a", "123456789").unwrap();
        assert_eq!(store.used_bytes(), 10);
    }

    #[test]
    fn test_injected_faults() {
        let store = InMemoryStore::new();
        store.set_item("k", "v").unwrap();

        store.set_fail_reads(true);
        assert!(store.get_item("k").is_err());
        store.set_fail_reads(false);

        store.set_fail_writes(true);
        assert!(store.set_item("k", "w").is_err());
        assert!(store.remove_item("k").is_err());
        store.set_fail_writes(false);

        assert_eq!(store.get_item("k").unwrap().as_deref(), Some("v"));
    }

    #[test]
    fn test_clear() {
        let store = InMemoryStore::new();
        for i in 0..10 {
            store.set_item(&format!("key-{}", i), "x").unwrap();
        }
        assert_eq!(store.len(), 10);
        store.clear();
        assert!(store.is_empty());
    }
}
