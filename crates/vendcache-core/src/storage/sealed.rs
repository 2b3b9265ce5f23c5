use std::path::PathBuf;

use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Key, Nonce,
};
use rand::rngs::OsRng;
use rand::RngCore;
use tracing::debug;

use super::file::FileStore;
use super::StorageError;

/// ChaCha20-Poly1305 nonce size in bytes.
const NONCE_LEN: usize = 12;

/// Argon2 salt size in bytes. The salt is stored next to the sealed files;
/// it is not secret, only unique per installation.
const SALT_LEN: usize = 16;

/// File holding the per-installation key-derivation salt.
const SALT_FILE: &str = "seal.salt";

/// Encrypting wrapper over [`FileStore`].
///
/// Values are sealed as `nonce || ciphertext` with a key derived from a
/// keychain-held passphrase via Argon2. A value that fails to open is
/// reported as [`StorageError::Sealed`]; callers treat that the same as a
/// missing record.
pub struct SealedStore {
    inner: FileStore,
    cipher: ChaCha20Poly1305,
}

impl SealedStore {
    /// Open a sealed store under `dir`, deriving the key from `passphrase`
    /// and the per-installation salt (created on first use).
    pub async fn open(dir: PathBuf, passphrase: &str) -> Result<Self, StorageError> {
        let salt = load_or_create_salt(&dir).await?;
        let mut key = [0u8; 32];
        argon2::Argon2::default()
            .hash_password_into(passphrase.as_bytes(), &salt, &mut key)
            .map_err(|_| StorageError::Sealed)?;
        Ok(Self::with_key(dir, &key))
    }

    /// Build a sealed store from raw key material. Used by tests and by
    /// callers that manage key derivation themselves.
    pub fn with_key(dir: PathBuf, key: &[u8; 32]) -> Self {
        let cipher = ChaCha20Poly1305::new(Key::from_slice(key));
        Self {
            inner: FileStore::with_extension(dir, "sealed"),
            cipher,
        }
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let blob = match self.inner.read_bytes(key).await? {
            Some(blob) => blob,
            None => return Ok(None),
        };
        if blob.len() < NONCE_LEN {
            debug!(key, len = blob.len(), "Sealed blob too short");
            return Err(StorageError::Sealed);
        }
        let (nonce, ciphertext) = blob.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| StorageError::Sealed)?;
        let text = String::from_utf8(plaintext).map_err(|_| StorageError::NotUtf8)?;
        Ok(Some(text))
    }

    pub async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);
        let ciphertext = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce), value.as_bytes())
            .map_err(|_| StorageError::Sealed)?;

        let mut blob = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        blob.extend_from_slice(&nonce);
        blob.extend_from_slice(&ciphertext);
        self.inner.write_bytes(key, &blob).await
    }

    pub async fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.inner.remove(key).await
    }
}

async fn load_or_create_salt(dir: &PathBuf) -> Result<Vec<u8>, StorageError> {
    let path = dir.join(SALT_FILE);
    match tokio::fs::read(&path).await {
        Ok(salt) if salt.len() == SALT_LEN => Ok(salt),
        Ok(_) | Err(_) => {
            let mut salt = vec![0u8; SALT_LEN];
            OsRng.fill_bytes(&mut salt);
            tokio::fs::create_dir_all(dir).await?;
            tokio::fs::write(&path, &salt).await?;
            Ok(salt)
        }
    }
}
