use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use super::types::{BlobPut, Identity, NewFileRecord, ProgressSink};
use super::errors::Result;

/// Durable blob storage with a resumable upload primitive
#[async_trait]
pub trait BlobStorage: Send + Sync {
    /// Transfer the blob and resolve a fetchable URL for it.
    ///
    /// `progress` receives the running byte count. Once `cancel` fires the
    /// implementation aborts the transfer and returns `UploadError::Cancelled`.
    async fn put(&self, request: BlobPut, progress: ProgressSink, cancel: CancellationToken) -> Result<String>;
}

/// Persists file metadata for a project through the backend API
#[async_trait]
pub trait MetadataRecorder: Send + Sync {
    async fn record(&self, identity: &Identity, project_id: &str, record: &NewFileRecord) -> Result<()>;
}
