mod metadata;
mod progress_stream;
mod tus;

pub use metadata::UploadMetadata;
pub use progress_stream::{chunk_bytes, ProgressStream};
pub use tus::{TusBlobStorage, TusConfig, TUS_RESUMABLE};
