use super::types::AssetType;

/// Decides what kind of asset a URL or stored file is.
///
/// Kept separate from reconciliation so the URL sniffing can be replaced by
/// explicit tags without touching the merge.
pub trait AssetClassifier: Send + Sync {
    /// Image URL found in an attachment or markdown image
    fn classify_image(&self, url: &str) -> AssetType;

    /// Plain markdown link; `None` means the link is not an asset
    fn classify_link(&self, url: &str) -> Option<AssetType>;

    /// File record from the metadata store
    fn classify_record(&self, content_type: &str, name: &str, url: &str) -> AssetType;
}

/// Substring and extension sniffing
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicClassifier;

impl AssetClassifier for HeuristicClassifier {
    fn classify_image(&self, url: &str) -> AssetType {
        if url.to_ascii_lowercase().contains("render") {
            AssetType::Render
        } else {
            AssetType::Image
        }
    }

    fn classify_link(&self, url: &str) -> Option<AssetType> {
        let path = url.split(['?', '#']).next().unwrap_or(url);
        if path.to_ascii_lowercase().ends_with(".pdf") {
            Some(AssetType::Quote)
        } else {
            None
        }
    }

    fn classify_record(&self, content_type: &str, name: &str, url: &str) -> AssetType {
        if content_type.starts_with("image/") {
            if name.to_ascii_lowercase().contains("render") {
                AssetType::Render
            } else {
                self.classify_image(url)
            }
        } else if content_type.starts_with("video/") {
            AssetType::Video
        } else {
            AssetType::Quote
        }
    }
}
