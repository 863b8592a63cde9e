use std::sync::Arc;
use futures::StreamExt;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use super::classify::AssetClassifier;
use super::feed::LiveAssetFeed;
use super::reconciler::AssetReconciler;
use super::types::{AssetFilter, ChatMessage, MediaAsset};

/// What a mounted gallery renders
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GalleryState {
    pub assets: Vec<MediaAsset>,
    /// Non-blocking banner text, if the live feed is unhealthy
    pub notice: Option<String>,
}

impl GalleryState {
    fn from_reconciler(reconciler: &AssetReconciler) -> Self {
        Self {
            assets: reconciler.assets().to_vec(),
            notice: reconciler.notice().map(String::from),
        }
    }

    pub fn filtered(&self, filter: AssetFilter) -> Vec<&MediaAsset> {
        self.assets
            .iter()
            .filter(|asset| filter.matches(asset.asset_type))
            .collect()
    }
}

/// One mounted gallery: owns a reconciler, feeds it chat history and live
/// snapshots, and publishes every change. Dropping the view stops it.
pub struct GalleryView {
    state_rx: watch::Receiver<GalleryState>,
    seed_tx: mpsc::UnboundedSender<Vec<ChatMessage>>,
    cancel: CancellationToken,
    join_handle: Option<JoinHandle<()>>,
}

impl GalleryView {
    pub fn spawn(feed: Arc<dyn LiveAssetFeed>, project_id: &str, classifier: Arc<dyn AssetClassifier>) -> Self {
        let (state_tx, state_rx) = watch::channel(GalleryState::default());
        let (seed_tx, seed_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        let join_handle = tokio::spawn(run(
            feed,
            project_id.to_string(),
            AssetReconciler::new(classifier),
            seed_rx,
            state_tx,
            cancel.clone(),
        ));

        Self {
            state_rx,
            seed_tx,
            cancel,
            join_handle: Some(join_handle),
        }
    }

    /// Hand over the (full) chat history once it has loaded
    pub fn seed(&self, messages: Vec<ChatMessage>) {
        let _ = self.seed_tx.send(messages);
    }

    pub fn state(&self) -> GalleryState {
        self.state_rx.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<GalleryState> {
        self.state_rx.clone()
    }

    pub async fn close(mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.join_handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for GalleryView {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run(
    feed: Arc<dyn LiveAssetFeed>,
    project_id: String,
    mut reconciler: AssetReconciler,
    mut seed_rx: mpsc::UnboundedReceiver<Vec<ChatMessage>>,
    state_tx: watch::Sender<GalleryState>,
    cancel: CancellationToken,
) {
    let mut subscription = feed.subscribe(&project_id);
    let mut live_open = true;
    let mut seed_open = true;
    info!(%project_id, "gallery subscribed");

    while live_open || seed_open {
        tokio::select! {
            _ = cancel.cancelled() => break,
            messages = seed_rx.recv(), if seed_open => match messages {
                Some(messages) => reconciler.seed(&messages),
                None => seed_open = false,
            },
            snapshot = subscription.next(), if live_open => match snapshot {
                Some(Ok(assets)) => reconciler.apply_snapshot(assets),
                Some(Err(err)) => reconciler.apply_error(&err),
                None => {
                    debug!(%project_id, "live subscription ended");
                    live_open = false;
                }
            },
        }

        state_tx.send_replace(GalleryState::from_reconciler(&reconciler));
    }

    subscription.cancel();
    debug!(%project_id, "gallery closed");
}
