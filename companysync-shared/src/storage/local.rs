/// Local-disk blob store
///
/// Writes blobs into a single directory, flat. The HTTP layer serves that
/// directory read-only under `public_path`.

use async_trait::async_trait;
use bytes::Bytes;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use super::{generate_blob_name, is_valid_key, BlobStore, StorageError, StoredBlob};

#[derive(Debug, Clone)]
pub struct LocalDiskStore {
    root: PathBuf,
    public_path: String,
}

impl LocalDiskStore {
    /// `public_path` is the URL prefix the directory is served under
    pub fn new(root: impl Into<PathBuf>, public_path: impl Into<String>) -> Self {
        let public_path = public_path.into();
        Self {
            root: root.into(),
            public_path: public_path.trim_end_matches('/').to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Creates the upload directory if it does not exist
    pub async fn ensure_root(&self) -> Result<(), StorageError> {
        fs::create_dir_all(&self.root).await?;
        Ok(())
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        if !is_valid_key(key) {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(key))
    }

    fn url_for(&self, key: &str) -> String {
        format!("{}/{}", self.public_path, key)
    }
}

#[async_trait]
impl BlobStore for LocalDiskStore {
    async fn save(&self, original_name: &str, data: Bytes) -> Result<StoredBlob, StorageError> {
        self.ensure_root().await?;

        let key = generate_blob_name(original_name);
        let path = self.path_for(&key)?;

        // create_new: never overwrite an existing blob
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await?;
        file.write_all(&data).await?;
        file.flush().await?;

        debug!(key = %key, size = data.len(), "Blob saved");

        Ok(StoredBlob {
            url: self.url_for(&key),
            key,
        })
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;

        match fs::remove_file(&path).await {
            Ok(()) => {
                debug!(key = %key, "Blob deleted");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
