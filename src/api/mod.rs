mod client;
mod recorder;

pub use client::{error_message, status_message, ApiClient, ApiConfig};
pub use recorder::HttpMetadataRecorder;
