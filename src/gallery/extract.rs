use std::collections::HashSet;
use std::sync::LazyLock;
use chrono::{DateTime, Utc};
use regex::Regex;
use super::classify::AssetClassifier;
use super::types::{AssetType, ChatMessage, MediaAsset};

/// `![alt](url)` and `[text](url)`, optionally with a quoted title
static MARKDOWN_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(!?)\[([^\]]*)\]\(\s*<?([^)\s>]+)>?(?:\s+"[^"]*")?\s*\)"#).expect("valid markdown link regex")
});

/// Storage path embedded in a download URL, plain or percent-encoded
static STORAGE_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)projects(?:/|%2F)[^/?#]+?(?:/|%2F)uploads(?:/|%2F)([A-Za-z0-9._-]+)").expect("valid storage path regex")
});

/// Upload file id carried by a storage URL, if any
pub fn storage_file_id(url: &str) -> Option<String> {
    STORAGE_PATH
        .captures(url)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Synthesize gallery assets from chat history.
///
/// Best effort: attachments, markdown images and markdown PDF links are
/// picked up; anything else is ignored. Output keeps message order and holds
/// no duplicate ids.
pub fn extract_chat_assets(messages: &[ChatMessage], classifier: &dyn AssetClassifier) -> Vec<MediaAsset> {
    let mut seen = HashSet::new();
    let mut assets = Vec::new();

    for message in messages {
        for asset in message_assets(message, classifier) {
            if seen.insert(asset.id.clone()) {
                assets.push(asset);
            }
        }
    }

    assets
}

fn message_assets(message: &ChatMessage, classifier: &dyn AssetClassifier) -> Vec<MediaAsset> {
    let timestamp = message.timestamp.unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
    let mut assets = Vec::new();
    let asset_id = |kind: &str, index: usize, url: &str| {
        storage_file_id(url).unwrap_or_else(|| format!("{}-{}-{}", message.id, kind, index))
    };

    if let Some(attachments) = &message.attachments {
        for (index, url) in non_empty(&attachments.images).enumerate() {
            let id = asset_id("image", index, url.as_str());
            assets.push(MediaAsset::new(id, classifier.classify_image(url), url, timestamp));
        }
        for (index, url) in non_empty(&attachments.videos).enumerate() {
            let id = asset_id("video", index, url.as_str());
            assets.push(MediaAsset::new(id, AssetType::Video, url, timestamp));
        }
    }

    if let Some(content) = &message.content {
        let mut image_index = 0;
        let mut link_index = 0;

        for caps in MARKDOWN_LINK.captures_iter(content) {
            let is_image = !caps[1].is_empty();
            let text = caps[2].trim().to_string();
            let url = &caps[3];

            if is_image {
                let id = asset_id("md", image_index, url);
                image_index += 1;
                assets.push(
                    MediaAsset::new(id, classifier.classify_image(url), url, timestamp).with_title(Some(text)),
                );
            } else if let Some(asset_type) = classifier.classify_link(url) {
                let id = asset_id("pdf", link_index, url);
                link_index += 1;
                assets.push(MediaAsset::new(id, asset_type, url, timestamp).with_title(Some(text)));
            }
        }
    }

    assets
}

fn non_empty(urls: &[String]) -> impl Iterator<Item = &String> {
    urls.iter().filter(|url| !url.trim().is_empty())
}
