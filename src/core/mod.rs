mod errors;
mod manager;
mod progress;
mod traits;
mod types;

pub use errors::{Result, UploadError, UploadErrorKind};
pub use manager::{UploadManager, UploadManagerConfig, UploadTicket};
pub use progress::ProgressStore;
pub use traits::{BlobStorage, MetadataRecorder};
pub use types::{
    is_valid_project_id, percentage, sanitize_file_name, storage_path, BlobPut, ContentCategory, FileBlob, FileId,
    Identity, NewFileRecord, ProgressSink, UploadEvent, UploadOutcome, UploadProgress, UploadStatus,
};
