//! Durable key-value storage for the persisted session record.
//!
//! Values are stored one file per key, mirroring the layout used for the
//! on-disk response cache. Three backends:
//! - `FileStore`: plain JSON files under a directory
//! - `SealedStore`: the same files, encrypted at rest
//! - `MemoryStore`: process-local map, used by tests

pub mod file;
pub mod memory;
pub mod sealed;

use thiserror::Error;

pub use file::FileStore;
pub use memory::MemoryStore;
pub use sealed::SealedStore;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode value for storage: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("storage operation timed out")]
    Timeout,

    #[error("sealed value could not be opened")]
    Sealed,

    #[error("keychain unavailable: {0}")]
    Keychain(String),

    #[error("stored value is not valid UTF-8")]
    NotUtf8,
}

/// Storage backend for the session repository.
///
/// A closed set rather than a trait object: every call site stays concrete
/// and the async methods need no boxing.
pub enum StorageBackend {
    File(FileStore),
    Memory(MemoryStore),
    Sealed(SealedStore),
}

impl StorageBackend {
    pub async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        match self {
            StorageBackend::File(store) => store.get(key).await,
            StorageBackend::Memory(store) => store.get(key),
            StorageBackend::Sealed(store) => store.get(key).await,
        }
    }

    pub async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        match self {
            StorageBackend::File(store) => store.set(key, value).await,
            StorageBackend::Memory(store) => store.set(key, value),
            StorageBackend::Sealed(store) => store.set(key, value).await,
        }
    }

    /// Delete a key. Deleting a key that does not exist is not an error.
    pub async fn remove(&self, key: &str) -> Result<(), StorageError> {
        match self {
            StorageBackend::File(store) => store.remove(key).await,
            StorageBackend::Memory(store) => store.remove(key),
            StorageBackend::Sealed(store) => store.remove(key).await,
        }
    }
}
