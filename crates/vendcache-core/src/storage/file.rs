use std::path::PathBuf;

use super::StorageError;

/// One file per key under a directory, `<dir>/<key>.<ext>`.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
    ext: &'static str,
}

impl FileStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir, ext: "json" }
    }

    pub fn with_extension(dir: PathBuf, ext: &'static str) -> Self {
        Self { dir, ext }
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", key, self.ext))
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        match self.read_bytes(key).await? {
            Some(bytes) => {
                let text = String::from_utf8(bytes).map_err(|_| StorageError::NotUtf8)?;
                Ok(Some(text))
            }
            None => Ok(None),
        }
    }

    pub async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.write_bytes(key, value.as_bytes()).await
    }

    pub async fn remove(&self, key: &str) -> Result<(), StorageError> {
        let path = self.path(key);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    pub(crate) async fn read_bytes(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let path = self.path(key);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub(crate) async fn write_bytes(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        tokio::fs::write(self.path(key), bytes).await?;
        Ok(())
    }
}
