use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use crate::core::BlobPut;

/// Value of the TUS `Upload-Metadata` header
#[derive(Debug, Clone, Default)]
pub struct UploadMetadata {
    pairs: Vec<(String, String)>,
}

impl UploadMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_request(request: &BlobPut) -> Self {
        Self::new()
            .with("filename", &request.file_name)
            .with("filetype", &request.content_type)
            .with("path", &request.path)
            .with("projectId", &request.project_id)
    }

    pub fn with(mut self, key: &str, value: &str) -> Self {
        self.pairs.push((key.to_string(), value.to_string()));
        self
    }

    pub fn to_header(&self) -> String {
        self.pairs
            .iter()
            .map(|(key, value)| format!("{} {}", key, STANDARD.encode(value)))
            .collect::<Vec<_>>()
            .join(",")
    }
}
