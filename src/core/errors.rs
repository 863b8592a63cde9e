use thiserror::Error;

/// Machine-distinguishable category of an [`UploadError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadErrorKind {
    Authorization,
    Transport,
    Metadata,
    Cancelled,
    Invalid,
    Internal,
}

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Please sign in with a full account to upload files")]
    Unauthenticated,

    #[error("Upload failed: {0}")]
    Transport(String),

    #[error("Upload failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Storage server error: status code {status_code}, message: {message}")]
    ServerError {
        status_code: u16,
        message: String,
    },

    #[error("Failed to save file information: {0}")]
    Metadata(String),

    #[error("Upload cancelled by user")]
    Cancelled,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid header value: {0}")]
    InvalidHeaderValue(#[from] reqwest::header::InvalidHeaderValue),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl UploadError {
    pub fn server_error(status_code: u16, message: impl Into<String>) -> Self {
        Self::ServerError {
            status_code,
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    pub fn metadata(message: impl Into<String>) -> Self {
        Self::Metadata(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    pub fn kind(&self) -> UploadErrorKind {
        match self {
            Self::Unauthenticated => UploadErrorKind::Authorization,
            Self::Transport(_) | Self::Http(_) | Self::ServerError { .. } => UploadErrorKind::Transport,
            Self::Metadata(_) => UploadErrorKind::Metadata,
            Self::Cancelled => UploadErrorKind::Cancelled,
            Self::InvalidInput(_) | Self::InvalidHeaderValue(_) => UploadErrorKind::Invalid,
            Self::Internal(_) => UploadErrorKind::Internal,
        }
    }
}

impl From<std::io::Error> for UploadError {
    fn from(err: std::io::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

/// Error alias
pub type Result<T, E = UploadError> = std::result::Result<T, E>;
