pub mod api;
pub mod compress;
pub mod config;
pub mod core;
pub mod gallery;
pub mod logging;
pub mod storage;
pub mod utils;

pub use core::{
    ContentCategory,
    FileBlob,
    FileId,
    Identity,
    Result,
    UploadError,
    UploadEvent,
    UploadManager,
    UploadManagerConfig,
    UploadOutcome,
    UploadProgress,
    UploadStatus,
};

pub use api::{ApiClient, ApiConfig, HttpMetadataRecorder};
pub use compress::Compressor;
pub use gallery::{AssetReconciler, GalleryState, GalleryView, HttpRecordFeed, MediaAsset};
pub use storage::{TusBlobStorage, TusConfig};

#[cfg(test)]
mod testing;
