use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use super::storage::{DurableStore, StoreError};

/// In-memory durable store that records writes and can be told to fail
#[derive(Debug, Default)]
pub struct MemoryStore {
    files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    persist_calls: AtomicUsize,
    quarantined: Arc<Mutex<Vec<String>>>,
    backups: Arc<Mutex<Vec<(String, Vec<u8>)>>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to preload content under a name
    pub fn with_file(self, name: &str, bytes: Vec<u8>) -> Self {
        self.files.lock().insert(name.to_string(), bytes);
        self
    }

    /// Make subsequent loads fail
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent persists fail
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of successful persists
    pub fn persist_count(&self) -> usize {
        self.persist_calls.load(Ordering::SeqCst)
    }

    /// Current content stored under a name
    pub fn contents(&self, name: &str) -> Option<Vec<u8>> {
        self.files.lock().get(name).cloned()
    }

    /// Names that were moved aside
    pub fn quarantined(&self) -> Vec<String> {
        self.quarantined.lock().clone()
    }

    /// Copies taken by `backup`, oldest first
    pub fn backups(&self) -> Vec<(String, Vec<u8>)> {
        self.backups.lock().clone()
    }
}

impl DurableStore for MemoryStore {
    fn load(&self, name: &str) -> Result<Option<Vec<u8>>, StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::ReadError(format!("{}: injected failure", name)));
        }
        Ok(self.files.lock().get(name).cloned())
    }

    fn persist(&self, name: &str, bytes: &[u8]) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::WriteError(format!("{}: injected failure", name)));
        }
        self.files.lock().insert(name.to_string(), bytes.to_vec());
        self.persist_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn quarantine(&self, name: &str) -> Result<(), StoreError> {
        if self.files.lock().remove(name).is_some() {
            self.quarantined.lock().push(name.to_string());
        }
        Ok(())
    }

    fn backup(&self, name: &str) -> Result<(), StoreError> {
        if let Some(bytes) = self.files.lock().get(name).cloned() {
            self.backups.lock().push((name.to_string(), bytes));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_roundtrip() {
        let store = MemoryStore::new();
        assert_eq!(store.load("FailedTrades").unwrap(), None);

        store.persist("FailedTrades", b"abc").unwrap();
        assert_eq!(store.load("FailedTrades").unwrap(), Some(b"abc".to_vec()));
        assert_eq!(store.persist_count(), 1);
    }

    #[test]
    fn test_injected_failures() {
        let store = MemoryStore::new().with_file("FailedTrades", b"abc".to_vec());

        store.set_fail_reads(true);
        assert!(store.load("FailedTrades").is_err());

        store.set_fail_writes(true);
        assert!(store.persist("FailedTrades", b"x").is_err());
        assert_eq!(store.persist_count(), 0);
        assert_eq!(store.contents("FailedTrades"), Some(b"abc".to_vec()));
    }

    #[test]
    fn test_quarantine_removes_content() {
        let store = MemoryStore::new().with_file("FailedTrades", b"garbage".to_vec());
        store.quarantine("FailedTrades").unwrap();

        assert_eq!(store.contents("FailedTrades"), None);
        assert_eq!(store.quarantined(), vec!["FailedTrades".to_string()]);
    }

    #[test]
    fn test_backup_keeps_original() {
        let store = MemoryStore::new().with_file("FailedTrades", b"abc".to_vec());
        store.backup("FailedTrades").unwrap();
        store.backup("Missing").unwrap();

        assert_eq!(store.contents("FailedTrades"), Some(b"abc".to_vec()));
        assert_eq!(store.backups(), vec![("FailedTrades".to_string(), b"abc".to_vec())]);
    }
}
