use std::time::Duration;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use url::Url;
use crate::core::{Result, UploadError};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Backend base URL, e.g. `https://app.example.com`
    pub base_url: String,
    pub timeout_secs: u64,
    /// Interval between live file-list polls
    pub poll_interval_ms: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            timeout_secs: 30,
            poll_interval_ms: 5_000,
        }
    }
}

/// Thin wrapper over the backend's project file endpoints
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Self::with_client(client, &config.base_url)
    }

    pub fn with_client(client: Client, base_url: &str) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|_| UploadError::InvalidInput(format!("Invalid api base url: {:?}", base_url)))?;
        if base_url.cannot_be_a_base() {
            return Err(UploadError::InvalidInput(format!("Invalid api base url: {:?}", base_url.as_str())));
        }

        Ok(Self { client, base_url })
    }

    pub fn http(&self) -> &Client {
        &self.client
    }

    /// `{base}/api/projects/{project_id}/files`, with the project id percent-encoded
    pub fn files_url(&self, project_id: &str) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| UploadError::internal("api base url cannot be a base"))?
            .pop_if_empty()
            .extend(&["api", "projects", project_id, "files"]);
        Ok(url)
    }

    pub fn authorized(&self, builder: RequestBuilder, token: Option<&str>) -> RequestBuilder {
        match token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    error: Option<String>,
    message: Option<String>,
}

/// Human readable message for a failed response, preferring the server's own text
pub async fn error_message(response: Response) -> String {
    let status = response.status();
    match response.json::<ErrorBody>().await {
        Ok(body) => body
            .error
            .or(body.message)
            .unwrap_or_else(|| status_message(status)),
        Err(_) => status_message(status),
    }
}

pub fn status_message(status: StatusCode) -> String {
    match status {
        StatusCode::UNAUTHORIZED => "Your session has expired, please sign in again".to_string(),
        StatusCode::FORBIDDEN => "You do not have access to this project".to_string(),
        StatusCode::PAYLOAD_TOO_LARGE => "The file is too large".to_string(),
        StatusCode::TOO_MANY_REQUESTS => "Too many requests, please try again later".to_string(),
        _ => format!("Server responded with status {}", status.as_u16()),
    }
}
