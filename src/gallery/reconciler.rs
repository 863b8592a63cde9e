use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};
use super::classify::{AssetClassifier, HeuristicClassifier};
use super::extract::extract_chat_assets;
use super::feed::SubscriptionError;
use super::types::{AssetFilter, ChatMessage, MediaAsset};

/// Merges chat-derived and live assets into the gallery list.
///
/// The displayed list is always `live ++ chat-derived assets without a live
/// counterpart`, so every id appears once and the live copy wins.
pub struct AssetReconciler {
    classifier: Arc<dyn AssetClassifier>,
    chat: Vec<MediaAsset>,
    live: Vec<MediaAsset>,
    merged: Vec<MediaAsset>,
    notice: Option<String>,
}

impl Default for AssetReconciler {
    fn default() -> Self {
        Self::new(Arc::new(HeuristicClassifier))
    }
}

impl AssetReconciler {
    pub fn new(classifier: Arc<dyn AssetClassifier>) -> Self {
        Self {
            classifier,
            chat: Vec::new(),
            live: Vec::new(),
            merged: Vec::new(),
            notice: None,
        }
    }

    /// Rebuild the chat-derived subset from the full chat history
    pub fn seed(&mut self, messages: &[ChatMessage]) {
        self.chat = extract_chat_assets(messages, self.classifier.as_ref());
        debug!(count = self.chat.len(), "seeded assets from chat history");
        self.rebuild();
    }

    /// Replace the live subset with a fresh snapshot
    pub fn apply_snapshot(&mut self, snapshot: Vec<MediaAsset>) {
        let mut seen = HashSet::new();
        let mut live: Vec<MediaAsset> = snapshot
            .into_iter()
            .filter(|asset| !asset.url.is_empty() && seen.insert(asset.id.clone()))
            .collect();
        live.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        self.live = live;
        self.notice = None;
        self.rebuild();
    }

    /// Keep the current list and surface a banner
    pub fn apply_error(&mut self, err: &SubscriptionError) {
        warn!(error = %err, "live asset subscription error");
        self.notice = Some(err.notice());
    }

    pub fn assets(&self) -> &[MediaAsset] {
        &self.merged
    }

    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub fn filtered(&self, filter: AssetFilter) -> Vec<&MediaAsset> {
        self.merged
            .iter()
            .filter(|asset| filter.matches(asset.asset_type))
            .collect()
    }

    fn rebuild(&mut self) {
        let live_ids: HashSet<&str> = self.live.iter().map(|asset| asset.id.as_str()).collect();

        let mut merged = self.live.clone();
        merged.extend(
            self.chat
                .iter()
                .filter(|asset| !live_ids.contains(asset.id.as_str()))
                .cloned(),
        );

        self.merged = merged;
    }
}
