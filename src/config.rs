//! File-based settings for the command-line uploader

use std::fs;
use std::path::Path;
use std::sync::OnceLock;
use anyhow::{Context, Result};
use serde::Deserialize;
use crate::api::ApiConfig;
use crate::core::{ContentCategory, Identity};
use crate::storage::TusConfig;

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

static CONFIG: OnceLock<Config> = OnceLock::new();

#[derive(Deserialize, Debug, Clone)]
pub struct Config {
    pub storage: TusConfig,
    pub api: ApiConfig,
    pub session: SessionConfig,
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct SessionConfig {
    pub user_id: String,
    pub token: Option<String>,
    #[serde(default)]
    pub anonymous: bool,
}

impl SessionConfig {
    pub fn identity(&self) -> Identity {
        Identity {
            user_id: self.user_id.clone(),
            is_anonymous: self.anonymous,
            token: self.token.clone(),
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct UploadConfig {
    pub project_id: String,
    pub file_path: String,
    pub category: ContentCategory,
    /// Guessed from the file extension when absent
    pub content_type: Option<String>,
    pub max_concurrent: Option<usize>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            project_id: String::new(),
            file_path: String::new(),
            category: ContentCategory::Image,
            content_type: None,
            max_concurrent: None,
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: None,
        }
    }
}

impl Config {
    pub fn load_from(path: impl AsRef<Path>) -> Result<Config> {
        let path = path.as_ref();
        let config_str = fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        Self::parse(&config_str).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn parse(config_str: &str) -> Result<Config> {
        Ok(toml::from_str(config_str)?)
    }
}

/// Load `config.toml` once and hand out the shared copy
pub fn get_config() -> Result<&'static Config> {
    if let Some(config) = CONFIG.get() {
        return Ok(config);
    }
    let config = Config::load_from(DEFAULT_CONFIG_PATH)?;
    Ok(CONFIG.get_or_init(|| config))
}

/// Content type from a file extension; `application/octet-stream` when unknown
pub fn guess_content_type(file_name: &str) -> &'static str {
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "mp4" => "video/mp4",
        "mov" => "video/quicktime",
        "webm" => "video/webm",
        "pdf" => "application/pdf",
        _ => "application/octet-stream",
    }
}
