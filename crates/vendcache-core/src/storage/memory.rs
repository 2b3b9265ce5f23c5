use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use super::StorageError;

/// Process-local backend used by tests. `set_failing(true)` makes every
/// operation return an I/O error, for exercising degraded-storage paths.
///
/// Clones share the same map, so a test can keep a handle after handing
/// the store to a repository.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<HashMap<String, String>>>,
    failing: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), StorageError> {
        if self.failing.load(Ordering::SeqCst) {
            Err(StorageError::Io(std::io::Error::other("simulated storage failure")))
        } else {
            Ok(())
        }
    }

    pub fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.check()?;
        Ok(self.entries.lock().unwrap().get(key).cloned())
    }

    pub fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.check()?;
        self.entries.lock().unwrap().insert(key.to_string(), value.to_string());
        Ok(())
    }

    pub fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.check()?;
        self.entries.lock().unwrap().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let store = MemoryStore::new();
        store.set("session_id", "1700000000000").unwrap();
        assert_eq!(store.get("session_id").unwrap().as_deref(), Some("1700000000000"));
        store.remove("session_id").unwrap();
        assert_eq!(store.get("session_id").unwrap(), None);
    }

    #[test]
    fn test_failing_mode() {
        let store = MemoryStore::new();
        store.set("k", "v").unwrap();
        store.set_failing(true);
        assert!(store.get("k").is_err());
        assert!(store.set("k", "v2").is_err());
        store.set_failing(false);
        assert_eq!(store.get("k").unwrap().as_deref(), Some("v"));
    }
}
