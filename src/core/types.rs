use std::sync::Arc;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Upload identifier, `{epoch-ms}_{sanitizedFileName}`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct FileId(String);

impl FileId {
    pub fn compose(epoch_ms: i64, file_name: &str) -> Self {
        Self(format!("{}_{}", epoch_ms, sanitize_file_name(file_name)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for FileId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for FileId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Replace every character outside `[A-Za-z0-9._-]` with `_`
pub fn sanitize_file_name(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') { c } else { '_' })
        .collect();

    if sanitized.is_empty() {
        "file".to_string()
    } else {
        sanitized
    }
}

/// Project ids become one path segment: `[A-Za-z0-9._-]`, not `.` or `..`
pub fn is_valid_project_id(project_id: &str) -> bool {
    !project_id.is_empty()
        && project_id != "."
        && project_id != ".."
        && project_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
}

pub fn storage_path(project_id: &str, file_id: &FileId) -> String {
    format!("projects/{}/uploads/{}", project_id, file_id)
}

/// Declared content category of an upload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentCategory {
    Image,
    Document,
    Video,
}

/// Who is uploading
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Identity {
    pub user_id: String,
    pub is_anonymous: bool,
    /// Bearer token for the backend API
    pub token: Option<String>,
}

impl Identity {
    pub fn user(user_id: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            is_anonymous: false,
            token: Some(token.into()),
        }
    }

    pub fn guest(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            is_anonymous: true,
            token: None,
        }
    }
}

/// In-memory file contents with their declared type
#[derive(Debug, Clone)]
pub struct FileBlob {
    pub name: String,
    pub content_type: String,
    pub data: Bytes,
}

impl FileBlob {
    pub fn new(name: impl Into<String>, content_type: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            data: data.into(),
        }
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn is_image(&self) -> bool {
        self.content_type.starts_with("image/")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    Idle,
    Uploading,
    Success,
    Error,
}

/// Per-upload progress entry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UploadProgress {
    /// Percentage, 0..=100
    pub progress: u8,
    pub status: UploadStatus,
    pub error: Option<String>,
    pub url: Option<String>,
    pub bytes_transferred: u64,
    pub total_bytes: u64,
}

impl UploadProgress {
    pub fn started(total_bytes: u64) -> Self {
        Self {
            progress: 0,
            status: UploadStatus::Uploading,
            error: None,
            url: None,
            bytes_transferred: 0,
            total_bytes,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.status, UploadStatus::Success | UploadStatus::Error)
    }
}

pub fn percentage(bytes: u64, total: u64) -> u8 {
    if total == 0 {
        return 100;
    }
    ((bytes.min(total) as u128 * 100) / total as u128) as u8
}

#[derive(Debug, Clone)]
pub enum UploadEvent {
    Started {
        file_id: FileId,
        total_bytes: u64,
    },

    Progress {
        file_id: FileId,
        progress: u8,
    },

    Succeeded {
        file_id: FileId,
        url: String,
    },

    Failed {
        file_id: FileId,
        error: String,
    },
}

/// Record written by the metadata recorder after a successful transfer
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct NewFileRecord {
    pub file_id: String,
    pub url: String,
    pub name: String,
    #[serde(rename = "type")]
    pub content_type: String,
    pub size: u64,
}

/// Blob transfer request handed to the storage backend
#[derive(Debug, Clone)]
pub struct BlobPut {
    pub project_id: String,
    pub path: String,
    pub file_name: String,
    pub content_type: String,
    pub data: Bytes,
}

/// Receives the number of bytes sent so far
pub type ProgressSink = Arc<dyn Fn(u64) + Send + Sync>;

#[derive(Debug, Clone, PartialEq)]
pub struct UploadOutcome {
    pub file_id: FileId,
    pub storage_path: String,
    pub url: String,
    pub size: u64,
}
