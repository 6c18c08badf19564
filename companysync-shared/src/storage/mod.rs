/// Blob storage for uploaded files
///
/// Uploads are written once under a generated unique name and served from a
/// public URL. Names are random, not content hashes, so identical uploads
/// are stored twice.
///
/// # Example
///
/// ```no_run
/// use bytes::Bytes;
/// use companysync_shared::storage::{local::LocalDiskStore, BlobStore};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = LocalDiskStore::new("./uploads", "/uploads");
/// let blob = store.save("invoice.pdf", Bytes::from_static(b"%PDF-1.7")).await?;
/// assert!(blob.url.starts_with("/uploads/"));
/// store.delete(&blob.key).await?;
/// # Ok(())
/// # }
/// ```

pub mod local;

use async_trait::async_trait;
use bytes::Bytes;
use std::path::Path;
use uuid::Uuid;

/// Error type for blob storage
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Where a saved blob ended up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    /// Store-relative key, used to delete the blob later
    pub key: String,

    /// URL clients fetch the blob from
    pub url: String,
}

/// Write-once blob store
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Stores `data` under a fresh name derived from `original_name`'s
    /// extension
    async fn save(&self, original_name: &str, data: Bytes) -> Result<StoredBlob, StorageError>;

    /// Removes a blob; deleting a missing blob is not an error
    async fn delete(&self, key: &str) -> Result<(), StorageError>;
}

/// Lowercased extension of an uploaded filename, if it is safe to keep
///
/// Only short ASCII-alphanumeric extensions survive; anything else is
/// dropped rather than sanitized.
pub fn safe_extension(original_name: &str) -> Option<String> {
    let ext = Path::new(original_name).extension()?.to_str()?;

    if ext.is_empty() || ext.len() > 10 || !ext.bytes().all(|b| b.is_ascii_alphanumeric()) {
        return None;
    }

    Some(ext.to_ascii_lowercase())
}

/// Generates `<uuid-v4>[.<ext>]`
pub fn generate_blob_name(original_name: &str) -> String {
    let id = Uuid::new_v4();
    match safe_extension(original_name) {
        Some(ext) => format!("{}.{}", id, ext),
        None => id.to_string(),
    }
}

/// Whether `key` is a single path component with no traversal
pub fn is_valid_key(key: &str) -> bool {
    !key.is_empty()
        && key != "."
        && key != ".."
        && !key.contains(&['/', '\\', '\0'][..])
        && !key.starts_with('.')
}
