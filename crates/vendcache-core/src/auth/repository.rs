use std::future::Future;
use std::time::Duration;

use tokio::time::timeout;
use tracing::{debug, warn};

use crate::storage::{StorageBackend, StorageError};

use super::session::{PersistedSessionRecord, SessionId};

/// Storage key for the serialized session record.
const AUTH_DATA_KEY: &str = "auth_data";

/// Storage key for the bare session-id marker. On save the marker is
/// written before the record; on clear the record is removed first.
const SESSION_ID_KEY: &str = "session_id";

/// Upper bound on any single storage operation. A hung keychain or disk
/// must not wedge login or logout.
const STORAGE_TIMEOUT_SECS: u64 = 3;

/// Durable home of the session record, behind a [`StorageBackend`].
///
/// Storage failures never leave this type: every operation degrades to
/// "no stored session" (reads) or a logged no-op (writes), so a broken
/// disk or keychain costs persistence across restarts and nothing else.
pub struct PersistedSessionRepository {
    storage: StorageBackend,
}

impl PersistedSessionRepository {
    pub fn new(storage: StorageBackend) -> Self {
        Self { storage }
    }

    /// Persist a session record: the id marker first, then the record.
    pub async fn save(&self, record: &PersistedSessionRecord) {
        if let Err(e) = self.try_save(record).await {
            warn!(error = %e, "Failed to persist session");
        }
    }

    async fn try_save(&self, record: &PersistedSessionRecord) -> Result<(), StorageError> {
        let marker = record.session_id.to_string();
        with_timeout(self.storage.set(SESSION_ID_KEY, &marker)).await?;
        let json = serde_json::to_string(record)?;
        with_timeout(self.storage.set(AUTH_DATA_KEY, &json)).await?;
        Ok(())
    }

    /// Load the stored record. `Some` only when both the record and the
    /// id marker are present and parse; a torn or corrupt pair reads as
    /// no stored session.
    pub async fn load(&self) -> Option<PersistedSessionRecord> {
        let marker = match with_timeout(self.storage.get(SESSION_ID_KEY)).await {
            Ok(Some(marker)) => marker,
            Ok(None) => return None,
            Err(e) => {
                warn!(error = %e, "Failed to read session marker");
                return None;
            }
        };
        if SessionId::try_from(marker.clone()).is_err() {
            debug!(marker, "Stored session marker is not a valid id");
            return None;
        }

        let json = match with_timeout(self.storage.get(AUTH_DATA_KEY)).await {
            Ok(Some(json)) => json,
            Ok(None) => return None,
            Err(e) => {
                warn!(error = %e, "Failed to read session record");
                return None;
            }
        };
        match serde_json::from_str(&json) {
            Ok(record) => Some(record),
            Err(e) => {
                debug!(error = %e, "Stored session record failed to parse");
                None
            }
        }
    }

    /// Check a candidate id against the stored marker. A missing or
    /// unreadable marker invalidates the candidate.
    pub async fn validate(&self, candidate: SessionId) -> bool {
        match with_timeout(self.storage.get(SESSION_ID_KEY)).await {
            Ok(Some(marker)) => match SessionId::try_from(marker) {
                Ok(stored) => stored == candidate,
                Err(_) => false,
            },
            Ok(None) => false,
            Err(e) => {
                warn!(error = %e, "Failed to read session marker for validation");
                false
            }
        }
    }

    /// Remove both stored keys. Clearing an empty store is a no-op.
    pub async fn clear(&self) {
        for key in [AUTH_DATA_KEY, SESSION_ID_KEY] {
            if let Err(e) = with_timeout(self.storage.remove(key)).await {
                warn!(error = %e, key, "Failed to clear stored session");
            }
        }
    }
}

async fn with_timeout<T>(
    op: impl Future<Output = Result<T, StorageError>>,
) -> Result<T, StorageError> {
    match timeout(Duration::from_secs(STORAGE_TIMEOUT_SECS), op).await {
        Ok(result) => result,
        Err(_) => Err(StorageError::Timeout),
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use crate::storage::MemoryStore;

    use super::*;

    fn sample_record() -> PersistedSessionRecord {
        PersistedSessionRecord {
            user_id: 9001,
            display_name: "Mina Kaya".to_string(),
            token: "tok-xyz".to_string(),
            selected_entity: None,
            session_id: SessionId::fresh(),
            issued_at: Utc::now(),
        }
    }

    fn memory_repo() -> (MemoryStore, PersistedSessionRepository) {
        let mem = MemoryStore::new();
        let repo = PersistedSessionRepository::new(StorageBackend::Memory(mem.clone()));
        (mem, repo)
    }

    #[tokio::test]
    async fn test_save_load_round_trip() {
        let (_, repo) = memory_repo();
        let record = sample_record();
        repo.save(&record).await;

        let loaded = repo.load().await.expect("record should load");
        assert_eq!(loaded, record);
        assert!(repo.validate(record.session_id).await);
    }

    #[tokio::test]
    async fn test_load_requires_the_marker() {
        let (mem, repo) = memory_repo();
        let record = sample_record();
        repo.save(&record).await;
        mem.remove(SESSION_ID_KEY).unwrap();

        assert!(repo.load().await.is_none());
    }

    #[tokio::test]
    async fn test_load_requires_the_record() {
        let (mem, repo) = memory_repo();
        mem.set(SESSION_ID_KEY, "1700000000123").unwrap();

        assert!(repo.load().await.is_none());
    }

    #[tokio::test]
    async fn test_validate_detects_overwritten_marker() {
        let (mem, repo) = memory_repo();
        let record = sample_record();
        repo.save(&record).await;

        // Another device logged in and bumped the marker
        let newer = SessionId::fresh();
        mem.set(SESSION_ID_KEY, &newer.to_string()).unwrap();

        assert!(!repo.validate(record.session_id).await);
        assert!(repo.validate(newer).await);
    }

    #[tokio::test]
    async fn test_corrupt_record_reads_as_absent() {
        let (mem, repo) = memory_repo();
        let record = sample_record();
        repo.save(&record).await;
        mem.set(AUTH_DATA_KEY, "{not json").unwrap();

        assert!(repo.load().await.is_none());
    }

    #[tokio::test]
    async fn test_failing_storage_degrades_quietly() {
        let (mem, repo) = memory_repo();
        mem.set_failing(true);

        let record = sample_record();
        repo.save(&record).await;
        assert!(repo.load().await.is_none());
        assert!(!repo.validate(record.session_id).await);
        repo.clear().await;
    }

    #[tokio::test]
    async fn test_clear_removes_both_keys() {
        let (mem, repo) = memory_repo();
        let record = sample_record();
        repo.save(&record).await;
        repo.clear().await;

        assert!(mem.get(AUTH_DATA_KEY).unwrap().is_none());
        assert!(mem.get(SESSION_ID_KEY).unwrap().is_none());
        assert!(repo.load().await.is_none());

        // Idempotent
        repo.clear().await;
    }
}
