use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use super::classify::AssetClassifier;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetType {
    Image,
    Render,
    Video,
    Quote,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetMetadata {
    pub size: Option<u64>,
    pub uploaded_by: Option<String>,
    pub project_id: Option<String>,
    pub project_name: Option<String>,
}

/// One entry of the project gallery
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct MediaAsset {
    pub id: String,
    #[serde(rename = "type")]
    pub asset_type: AssetType,
    pub url: String,
    pub thumbnail: Option<String>,
    pub title: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub metadata: Option<AssetMetadata>,
}

impl MediaAsset {
    pub fn new(id: impl Into<String>, asset_type: AssetType, url: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        let url = url.into();
        let thumbnail = match asset_type {
            AssetType::Image | AssetType::Render => Some(url.clone()),
            AssetType::Video | AssetType::Quote => None,
        };

        Self {
            id: id.into(),
            asset_type,
            url,
            thumbnail,
            title: None,
            timestamp,
            metadata: None,
        }
    }

    pub fn with_title(mut self, title: Option<String>) -> Self {
        self.title = title.filter(|t| !t.trim().is_empty());
        self
    }
}

/// Type filter applied to the reconciled list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetFilter {
    #[default]
    All,
    Image,
    Render,
    Quote,
    Video,
}

impl AssetFilter {
    pub fn matches(&self, asset_type: AssetType) -> bool {
        match self {
            AssetFilter::All => true,
            AssetFilter::Image => asset_type == AssetType::Image,
            AssetFilter::Render => asset_type == AssetType::Render,
            AssetFilter::Quote => asset_type == AssetType::Quote,
            AssetFilter::Video => asset_type == AssetType::Video,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ChatAttachments {
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub videos: Vec<String>,
}

/// Chat history entry as supplied by the history provider
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub attachments: Option<ChatAttachments>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

/// File record as stored by the backend's metadata store
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    #[serde(alias = "fileId", alias = "file_id")]
    pub id: String,
    pub name: String,
    pub url: String,
    #[serde(rename = "type")]
    pub content_type: String,
    #[serde(default)]
    pub size: Option<u64>,
    pub uploaded_at: DateTime<Utc>,
    #[serde(default)]
    pub uploaded_by: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub project_name: Option<String>,
}

impl FileRecord {
    pub fn into_asset(self, classifier: &dyn AssetClassifier) -> MediaAsset {
        let asset_type = classifier.classify_record(&self.content_type, &self.name, &self.url);
        let mut asset = MediaAsset::new(self.id, asset_type, self.url, self.uploaded_at)
            .with_title(Some(self.name));
        asset.metadata = Some(AssetMetadata {
            size: self.size,
            uploaded_by: self.uploaded_by,
            project_id: self.project_id,
            project_name: self.project_name,
        });
        asset
    }
}
