//! Project gallery: chat-derived and live assets merged into one list

mod classify;
mod extract;
mod feed;
mod reconciler;
mod types;
mod view;

pub use classify::{AssetClassifier, HeuristicClassifier};
pub use extract::{extract_chat_assets, storage_file_id};
pub use feed::{AssetSubscription, HttpRecordFeed, LiveAssetFeed, Snapshot, SubscriptionError};
pub use reconciler::AssetReconciler;
pub use types::{AssetFilter, AssetMetadata, AssetType, ChatAttachments, ChatMessage, FileRecord, MediaAsset};
pub use view::{GalleryState, GalleryView};
