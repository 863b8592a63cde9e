use async_trait::async_trait;
use tracing::debug;
use crate::core::{Identity, MetadataRecorder, NewFileRecord, Result, UploadError};
use super::client::{error_message, ApiClient};

/// Records uploaded files through the backend so access control and quota
/// checks stay server-side
#[derive(Debug, Clone)]
pub struct HttpMetadataRecorder {
    api: ApiClient,
}

impl HttpMetadataRecorder {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }
}

#[async_trait]
impl MetadataRecorder for HttpMetadataRecorder {
    async fn record(&self, identity: &Identity, project_id: &str, record: &NewFileRecord) -> Result<()> {
        let url = self.api.files_url(project_id)?;

        let response = self
            .api
            .authorized(self.api.http().post(url), identity.token.as_deref())
            .json(record)
            .send()
            .await
            .map_err(|err| UploadError::metadata(err.to_string()))?;

        if !response.status().is_success() {
            return Err(UploadError::metadata(error_message(response).await));
        }

        debug!(project_id, file_id = %record.file_id, "file metadata recorded");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{Method, StatusCode};
    use axum::response::IntoResponse;
    use axum::Json;
    use serde_json::json;
    use crate::core::UploadErrorKind;
    use crate::testing::{Captured, StubServer};
    use super::super::client::ApiConfig;

    fn recorder(base_url: &str) -> HttpMetadataRecorder {
        let config = ApiConfig {
            base_url: base_url.to_string(),
            ..Default::default()
        };
        HttpMetadataRecorder::new(ApiClient::new(&config).unwrap())
    }

    fn record() -> NewFileRecord {
        NewFileRecord {
            file_id: "1700000000000_kitchen.jpg".to_string(),
            url: "https://cdn.example.com/projects/proj-123/uploads/1700000000000_kitchen.jpg".to_string(),
            name: "kitchen.jpg".to_string(),
            content_type: "image/jpeg".to_string(),
            size: 2048,
        }
    }

    async fn record_against(server: &StubServer) -> Result<()> {
        recorder(&server.base_url)
            .record(&Identity::user("u-1", "t-1"), "proj-123", &record())
            .await
    }

    #[tokio::test]
    async fn test_record_posts_json_with_bearer_token() {
        let server = StubServer::start(|_: &Captured| StatusCode::CREATED.into_response()).await;
        record_against(&server).await.unwrap();

        let requests = server.requests();
        assert_eq!(requests.len(), 1);
        let req = &requests[0];
        assert_eq!(req.method, Method::POST);
        assert_eq!(req.path, "/api/projects/proj-123/files");
        assert_eq!(req.header("Authorization"), Some("Bearer t-1"));
        assert_eq!(req.header("Content-Type"), Some("application/json"));

        let body: serde_json::Value = serde_json::from_slice(&req.body).unwrap();
        assert_eq!(
            body,
            json!({
                "file_id": "1700000000000_kitchen.jpg",
                "url": "https://cdn.example.com/projects/proj-123/uploads/1700000000000_kitchen.jpg",
                "name": "kitchen.jpg",
                "type": "image/jpeg",
                "size": 2048
            })
        );
    }

    #[tokio::test]
    async fn test_rejection_carries_server_error_text() {
        let server = StubServer::start(|_: &Captured| {
            (StatusCode::FORBIDDEN, Json(json!({ "error": "Project is archived" }))).into_response()
        })
        .await;

        let err = record_against(&server).await.unwrap_err();
        assert_eq!(err.kind(), UploadErrorKind::Metadata);
        assert_eq!(err.to_string(), "Failed to save file information: Project is archived");
    }

    #[tokio::test]
    async fn test_rejection_falls_back_to_message_then_status() {
        let server = StubServer::start(|_: &Captured| {
            (StatusCode::BAD_REQUEST, Json(json!({ "message": "size is required" }))).into_response()
        })
        .await;
        let err = record_against(&server).await.unwrap_err();
        assert_eq!(err.to_string(), "Failed to save file information: size is required");

        let server = StubServer::start(|_: &Captured| StatusCode::INTERNAL_SERVER_ERROR.into_response()).await;
        let err = record_against(&server).await.unwrap_err();
        assert_eq!(err.kind(), UploadErrorKind::Metadata);
        assert_eq!(err.to_string(), "Failed to save file information: Server responded with status 500");
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_a_metadata_error() {
        let err = recorder("http://127.0.0.1:1")
            .record(&Identity::user("u-1", "t-1"), "proj-123", &record())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), UploadErrorKind::Metadata);
    }
}
