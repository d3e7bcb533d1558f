mod client;
mod error;

pub use client::ObjectStorageClient;
pub use error::StorageError;

use async_trait::async_trait;

/// Destination for face crops. Writing the same path twice overwrites the object.
#[async_trait]
pub trait CropStorage: Send + Sync {
    /// Stores `bytes` at `path` and returns the URL the object can be read from.
    async fn put(&self, path: &str, bytes: Vec<u8>, content_type: &str)
    -> Result<String, StorageError>;
}
