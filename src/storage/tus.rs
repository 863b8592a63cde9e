use std::collections::HashMap;
use std::time::{Duration, Instant};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;
use crate::core::{BlobPut, BlobStorage, ProgressSink, Result, UploadError};
use crate::utils::{format_bytes, format_rate};
use super::metadata::UploadMetadata;
use super::progress_stream::{chunk_bytes, ProgressStream};

pub const TUS_RESUMABLE: &str = "1.0.0";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TusConfig {
    /// Creation endpoint, e.g. `https://storage.example.com/files/`
    pub endpoint: String,
    /// Size of the body chunks handed to the HTTP client
    pub chunk_size: usize,
    /// Public base the stored path is served from; falls back to the upload URL
    pub public_base_url: Option<String>,
    /// Extra headers sent with every request (authorization, tenant ...)
    pub headers: HashMap<String, String>,
    pub timeout_secs: u64,
}

impl Default for TusConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            chunk_size: 256 * 1024,
            public_base_url: None,
            headers: HashMap::new(),
            timeout_secs: 300,
        }
    }
}

/// Blob storage speaking the TUS resumable upload protocol
#[derive(Debug, Clone)]
pub struct TusBlobStorage {
    client: Client,
    config: TusConfig,
    headers: HeaderMap,
}

impl TusBlobStorage {
    pub fn new(config: TusConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Self::with_client(client, config)
    }

    pub fn with_client(client: Client, config: TusConfig) -> Result<Self> {
        Url::parse(&config.endpoint)
            .map_err(|_| UploadError::InvalidInput(format!("Invalid storage endpoint: {:?}", config.endpoint)))?;

        let mut headers = HeaderMap::new();
        headers.insert("Tus-Resumable", HeaderValue::from_static(TUS_RESUMABLE));
        for (key, value) in &config.headers {
            let name = HeaderName::from_bytes(key.as_bytes())
                .map_err(|err| UploadError::InvalidInput(format!("Invalid header name {}: {}", key, err)))?;
            headers.insert(name, HeaderValue::from_str(value)?);
        }

        Ok(Self { client, config, headers })
    }

    pub fn parse_offset_header(status: u16, headers: &HeaderMap) -> Result<u64> {
        match headers.get("Upload-Offset") {
            Some(value) => value
                .to_str()
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .ok_or_else(|| UploadError::server_error(status, "Malformed 'Upload-Offset' header")),
            None => Err(UploadError::server_error(status, "No 'Upload-Offset' header in response")),
        }
    }

    pub async fn create_upload(&self, file_size: u64, metadata: &UploadMetadata) -> Result<String> {
        let mut headers = self.headers.clone();
        headers.insert("Upload-Length", HeaderValue::from_str(&file_size.to_string())?);
        headers.insert("Upload-Metadata", HeaderValue::from_str(&metadata.to_header())?);

        let response = self
            .client
            .post(&self.config.endpoint)
            .headers(headers)
            .send()
            .await?;

        if response.status() != StatusCode::CREATED {
            return Err(UploadError::server_error(response.status().as_u16(), "Failed to create upload"));
        }

        let location = response
            .headers()
            .get("location")
            .and_then(|loc| loc.to_str().ok())
            .ok_or_else(|| UploadError::server_error(response.status().as_u16(), "No 'Location' header in response"))?;

        self.absolute_url(location)
    }

    /// Stream the whole blob with a single PATCH, returning the server's final offset
    pub async fn patch(&self, upload_url: &str, data: Bytes, progress: ProgressSink) -> Result<u64> {
        let total = data.len() as u64;
        let chunks = chunk_bytes(data, self.config.chunk_size)
            .into_iter()
            .map(Ok::<_, std::io::Error>);
        let body = reqwest::Body::wrap_stream(ProgressStream::new(futures::stream::iter(chunks), progress));

        let mut headers = self.headers.clone();
        headers.insert("Content-Type", HeaderValue::from_static("application/offset+octet-stream"));
        headers.insert("Upload-Offset", HeaderValue::from_static("0"));
        headers.insert("Content-Length", HeaderValue::from_str(&total.to_string())?);

        let response = self
            .client
            .patch(upload_url)
            .headers(headers)
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::NO_CONTENT {
            return Err(UploadError::server_error(status.as_u16(), format!("Upload failed with status {}", status)));
        }

        Self::parse_offset_header(status.as_u16(), response.headers())
    }

    pub async fn terminate(&self, upload_url: &str) -> Result<()> {
        let response = self
            .client
            .delete(upload_url)
            .headers(self.headers.clone())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() && status != StatusCode::NOT_FOUND {
            return Err(UploadError::server_error(status.as_u16(), "Failed to terminate upload"));
        }

        Ok(())
    }

    pub fn resolve_url(&self, path: &str, upload_url: &str) -> String {
        match &self.config.public_base_url {
            Some(base) => format!("{}/{}", base.trim_end_matches('/'), path),
            None => upload_url.to_string(),
        }
    }

    fn absolute_url(&self, location: &str) -> Result<String> {
        if location.starts_with("http") {
            return Ok(location.to_string());
        }

        let base = Url::parse(&self.config.endpoint)
            .map_err(|_| UploadError::InvalidInput(format!("Invalid url: {:?}", self.config.endpoint)))?;
        let joined = base
            .join(location)
            .map_err(|err| UploadError::server_error(201, format!("Invalid 'Location' header: {}", err)))?;

        Ok(joined.to_string())
    }

    /// Best effort; the caller has already moved on
    fn spawn_terminate(&self, upload_url: String) {
        let storage = self.clone();
        tokio::spawn(async move {
            if let Err(err) = storage.terminate(&upload_url).await {
                debug!(%upload_url, error = %err, "failed to terminate cancelled upload");
            }
        });
    }
}

#[async_trait]
impl BlobStorage for TusBlobStorage {
    async fn put(&self, request: BlobPut, progress: ProgressSink, cancel: CancellationToken) -> Result<String> {
        let total = request.data.len() as u64;
        let metadata = UploadMetadata::for_request(&request);

        let upload_url = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(UploadError::Cancelled),
            created = self.create_upload(total, &metadata) => created?,
        };
        debug!(path = %request.path, %upload_url, "upload session created");

        let started = Instant::now();
        let offset = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                self.spawn_terminate(upload_url.clone());
                return Err(UploadError::Cancelled);
            }
            patched = self.patch(&upload_url, request.data, progress) => patched?,
        };

        if offset != total {
            warn!(path = %request.path, expected = total, actual = offset, "upload incomplete");
            return Err(UploadError::transport(format!(
                "Upload incomplete, expected: {}, actual: {}",
                total, offset
            )));
        }

        info!(
            path = %request.path,
            size = %format_bytes(total),
            rate = %format_rate(total, started.elapsed()),
            "blob stored"
        );

        Ok(self.resolve_url(&request.path, &upload_url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use axum::http::Method;
    use axum::response::{IntoResponse, Response};
    use parking_lot::Mutex;
    use crate::testing::{Captured, StubServer};

    fn storage(public_base_url: Option<&str>) -> TusBlobStorage {
        TusBlobStorage::new(TusConfig {
            endpoint: "https://storage.example.com/files/".to_string(),
            public_base_url: public_base_url.map(String::from),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_relative_location_is_joined() {
        let storage = storage(None);
        assert_eq!(
            storage.absolute_url("/files/abc123").unwrap(),
            "https://storage.example.com/files/abc123"
        );
        assert_eq!(
            storage.absolute_url("https://other.example.com/files/x").unwrap(),
            "https://other.example.com/files/x"
        );
    }

    #[test]
    fn test_resolve_url() {
        let path = "projects/p1/uploads/1_a.png";
        assert_eq!(
            storage(Some("https://cdn.example.com/")).resolve_url(path, "https://storage.example.com/files/abc"),
            "https://cdn.example.com/projects/p1/uploads/1_a.png"
        );
        assert_eq!(
            storage(None).resolve_url(path, "https://storage.example.com/files/abc"),
            "https://storage.example.com/files/abc"
        );
    }

    #[test]
    fn test_parse_offset_header() {
        let mut headers = HeaderMap::new();
        assert!(TusBlobStorage::parse_offset_header(204, &headers).is_err());

        headers.insert("Upload-Offset", HeaderValue::from_static("1024"));
        assert_eq!(TusBlobStorage::parse_offset_header(204, &headers).unwrap(), 1024);

        headers.insert("Upload-Offset", HeaderValue::from_static("abc"));
        assert!(TusBlobStorage::parse_offset_header(204, &headers).is_err());
    }

    #[test]
    fn test_invalid_endpoint_is_rejected() {
        let result = TusBlobStorage::new(TusConfig::default());
        assert!(matches!(result, Err(UploadError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_cancelled_before_create_makes_no_request() {
        let storage = storage(None);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let request = BlobPut {
            project_id: "p1".to_string(),
            path: "projects/p1/uploads/1_a.png".to_string(),
            file_name: "a.png".to_string(),
            content_type: "image/png".to_string(),
            data: Bytes::from_static(b"abc"),
        };
        let result = storage.put(request, std::sync::Arc::new(|_: u64| {}), cancel).await;
        assert!(matches!(result, Err(UploadError::Cancelled)));
    }

    fn stub_storage(server: &StubServer, public_base_url: Option<&str>) -> TusBlobStorage {
        TusBlobStorage::new(TusConfig {
            endpoint: format!("{}/files/", server.base_url),
            chunk_size: 4,
            public_base_url: public_base_url.map(String::from),
            headers: HashMap::from([("Authorization".to_string(), "Bearer storage-token".to_string())]),
            ..Default::default()
        })
        .unwrap()
    }

    fn put_request(data: &'static [u8]) -> BlobPut {
        BlobPut {
            project_id: "p1".to_string(),
            path: "projects/p1/uploads/1_a.png".to_string(),
            file_name: "a.png".to_string(),
            content_type: "image/png".to_string(),
            data: Bytes::from_static(data),
        }
    }

    /// Well-behaved TUS server: creates at `/files/abc` and accepts every byte
    fn tus_server(req: &Captured) -> Response {
        if req.method == Method::POST {
            (StatusCode::CREATED, [("Location", "/files/abc")]).into_response()
        } else if req.method == Method::PATCH {
            (StatusCode::NO_CONTENT, [("Upload-Offset", req.body.len().to_string())]).into_response()
        } else {
            StatusCode::NO_CONTENT.into_response()
        }
    }

    fn no_progress() -> ProgressSink {
        Arc::new(|_: u64| {})
    }

    #[tokio::test]
    async fn test_put_creates_then_streams_patch() {
        let server = StubServer::start(tus_server).await;
        let storage = stub_storage(&server, Some("https://cdn.example.com"));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink: ProgressSink = {
            let seen = seen.clone();
            Arc::new(move |bytes: u64| seen.lock().push(bytes))
        };

        let url = storage
            .put(put_request(b"0123456789"), sink, CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(url, "https://cdn.example.com/projects/p1/uploads/1_a.png");

        let requests = server.requests();
        assert_eq!(requests.len(), 2);

        let create = &requests[0];
        assert_eq!(create.method, Method::POST);
        assert_eq!(create.path, "/files/");
        assert_eq!(create.header("Tus-Resumable"), Some(TUS_RESUMABLE));
        assert_eq!(create.header("Upload-Length"), Some("10"));
        assert_eq!(create.header("Authorization"), Some("Bearer storage-token"));
        assert!(create.header("Upload-Metadata").unwrap().contains("filename YS5wbmc="));

        let patch = &requests[1];
        assert_eq!(patch.method, Method::PATCH);
        assert_eq!(patch.path, "/files/abc");
        assert_eq!(patch.header("Content-Type"), Some("application/offset+octet-stream"));
        assert_eq!(patch.header("Upload-Offset"), Some("0"));
        assert_eq!(patch.body, Bytes::from_static(b"0123456789"));

        assert_eq!(*seen.lock(), vec![4, 8, 10]);
    }

    #[tokio::test]
    async fn test_put_without_public_base_returns_upload_url() {
        let server = StubServer::start(tus_server).await;
        let storage = stub_storage(&server, None);

        let url = storage
            .put(put_request(b"abc"), no_progress(), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(url, format!("{}/files/abc", server.base_url));
    }

    #[tokio::test]
    async fn test_short_offset_is_a_transport_error() {
        let server = StubServer::start(|req: &Captured| {
            if req.method == Method::POST {
                (StatusCode::CREATED, [("Location", "/files/abc")]).into_response()
            } else {
                (StatusCode::NO_CONTENT, [("Upload-Offset", "5")]).into_response()
            }
        })
        .await;
        let storage = stub_storage(&server, None);

        let err = storage
            .put(put_request(b"0123456789"), no_progress(), CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::Transport(ref msg) if msg.contains("Upload incomplete")));
    }

    #[tokio::test]
    async fn test_create_failures_are_server_errors() {
        let server = StubServer::start(|_: &Captured| StatusCode::INTERNAL_SERVER_ERROR.into_response()).await;
        let err = stub_storage(&server, None)
            .put(put_request(b"abc"), no_progress(), CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::ServerError { status_code: 500, .. }));
        assert_eq!(server.requests().len(), 1);

        // 201 without a Location to PATCH
        let server = StubServer::start(|_: &Captured| StatusCode::CREATED.into_response()).await;
        let err = stub_storage(&server, None)
            .put(put_request(b"abc"), no_progress(), CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::ServerError { status_code: 201, .. }));
    }

    #[tokio::test]
    async fn test_patch_must_answer_no_content() {
        let server = StubServer::start(|req: &Captured| {
            if req.method == Method::POST {
                (StatusCode::CREATED, [("Location", "/files/abc")]).into_response()
            } else {
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        })
        .await;

        let err = stub_storage(&server, None)
            .put(put_request(b"abc"), no_progress(), CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::ServerError { status_code: 500, .. }));
    }

    #[tokio::test]
    async fn test_cancel_during_patch_terminates_upload() {
        let server = StubServer::stalling(Method::PATCH, tus_server).await;
        let storage = stub_storage(&server, None);
        let cancel = CancellationToken::new();

        let handle = tokio::spawn({
            let storage = storage.clone();
            let cancel = cancel.clone();
            async move { storage.put(put_request(b"0123456789"), no_progress(), cancel).await }
        });

        server.wait_for(Method::PATCH).await;
        cancel.cancel();
        let result = handle.await.unwrap();
        assert!(matches!(result, Err(UploadError::Cancelled)));

        let delete = server.wait_for(Method::DELETE).await;
        assert_eq!(delete.path, "/files/abc");
        assert_eq!(delete.header("Tus-Resumable"), Some(TUS_RESUMABLE));
    }
}
