//! Storage backends for rendered documents.

pub mod filesystem;

pub use filesystem::FileStorage;

use async_trait::async_trait;

use crate::error::StorageError;

/// Reference to an uploaded object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub url: String,
    pub public_id: String,
    pub size: u64,
}

/// Destination for rendered document uploads.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Uploads a buffer under the given filename and returns its reference.
    async fn upload(&self, buffer: &[u8], filename: &str) -> Result<StoredObject, StorageError>;
}
