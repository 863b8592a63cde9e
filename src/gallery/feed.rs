use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use futures::stream::BoxStream;
use futures::{Stream, StreamExt};
use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use crate::api::{error_message, ApiClient};
use super::classify::{AssetClassifier, HeuristicClassifier};
use super::types::{FileRecord, MediaAsset};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SubscriptionError {
    #[error("You no longer have access to this project's files: {0}")]
    Unauthorized(String),

    #[error("Couldn't refresh project files: {0}")]
    Transport(String),
}

impl SubscriptionError {
    /// Text for the non-blocking banner shown over the gallery
    pub fn notice(&self) -> String {
        self.to_string()
    }
}

/// Full list of live assets, newest upload first
pub type Snapshot = std::result::Result<Vec<MediaAsset>, SubscriptionError>;

/// Cancellable stream of live snapshots. Dropping it ends the subscription.
pub struct AssetSubscription {
    inner: BoxStream<'static, Snapshot>,
    cancel: CancellationToken,
}

impl AssetSubscription {
    pub fn new<S>(stream: S) -> Self
    where
        S: Stream<Item = Snapshot> + Send + 'static,
    {
        let cancel = CancellationToken::new();
        let inner = stream.take_until(cancel.clone().cancelled_owned()).boxed();
        Self { inner, cancel }
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Stream for AssetSubscription {
    type Item = Snapshot;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx)
    }
}

impl Drop for AssetSubscription {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Source of live, project-scoped asset snapshots
pub trait LiveAssetFeed: Send + Sync {
    fn subscribe(&self, project_id: &str) -> AssetSubscription;
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FilesResponse {
    List(Vec<FileRecord>),
    Wrapped { files: Vec<FileRecord> },
}

impl FilesResponse {
    fn into_records(self) -> Vec<FileRecord> {
        match self {
            FilesResponse::List(records) => records,
            FilesResponse::Wrapped { files } => files,
        }
    }
}

/// Polls the backend's project file list and emits every result as a snapshot
#[derive(Clone)]
pub struct HttpRecordFeed {
    api: ApiClient,
    token: Option<String>,
    interval: Duration,
    classifier: Arc<dyn AssetClassifier>,
}

impl HttpRecordFeed {
    pub fn new(api: ApiClient, token: Option<String>, interval: Duration) -> Self {
        Self {
            api,
            token,
            interval,
            classifier: Arc::new(HeuristicClassifier),
        }
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn AssetClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    pub async fn fetch(&self, project_id: &str) -> Snapshot {
        let mut url = self
            .api
            .files_url(project_id)
            .map_err(|err| SubscriptionError::Transport(err.to_string()))?;
        url.query_pairs_mut()
            .append_pair("orderBy", "uploadedAt")
            .append_pair("direction", "desc");

        let response = self
            .api
            .authorized(self.api.http().get(url), self.token.as_deref())
            .send()
            .await
            .map_err(|err| SubscriptionError::Transport(err.to_string()))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(SubscriptionError::Unauthorized(error_message(response).await));
        }
        if !status.is_success() {
            return Err(SubscriptionError::Transport(error_message(response).await));
        }

        let records = response
            .json::<FilesResponse>()
            .await
            .map_err(|err| SubscriptionError::Transport(err.to_string()))?
            .into_records();

        let mut assets: Vec<MediaAsset> = records
            .into_iter()
            .map(|record| record.into_asset(self.classifier.as_ref()))
            .collect();
        assets.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        debug!(project_id, count = assets.len(), "live snapshot fetched");
        Ok(assets)
    }
}

impl LiveAssetFeed for HttpRecordFeed {
    fn subscribe(&self, project_id: &str) -> AssetSubscription {
        let state = (self.clone(), project_id.to_string(), true);

        let stream = futures::stream::unfold(state, |(feed, project_id, first)| async move {
            if !first {
                tokio::time::sleep(feed.interval).await;
            }
            let snapshot = feed.fetch(&project_id).await;
            if let Err(err) = &snapshot {
                warn!(%project_id, error = %err, "live snapshot failed");
            }
            Some((snapshot, (feed, project_id, false)))
        });

        AssetSubscription::new(stream)
    }
}
