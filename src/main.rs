use std::path::Path;
use std::sync::Arc;
use anyhow::{bail, Context, Result};
use tracing::info;
use reno_media::config::{get_config, guess_content_type};
use reno_media::logging::init_logging;
use reno_media::utils::format_bytes;
use reno_media::{
    ApiClient, Compressor, FileBlob, HttpMetadataRecorder, TusBlobStorage, UploadEvent, UploadManager,
    UploadManagerConfig,
};

#[tokio::main]
async fn main() -> Result<()> {
    let config = get_config()?;
    init_logging(&config.logging.level, config.logging.format.as_deref())?;

    let upload = &config.upload;
    if upload.file_path.is_empty() {
        bail!("[upload] file_path is not set");
    }

    let storage = Arc::new(TusBlobStorage::new(config.storage.clone())?);
    let recorder = Arc::new(HttpMetadataRecorder::new(ApiClient::new(&config.api)?));
    let manager = UploadManager::with_config(
        storage,
        recorder,
        Compressor::default(),
        UploadManagerConfig {
            max_concurrent: upload.max_concurrent,
            ..Default::default()
        },
    );

    let path = Path::new(&upload.file_path);
    let data = tokio::fs::read(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| upload.file_path.clone());
    let content_type = upload
        .content_type
        .clone()
        .unwrap_or_else(|| guess_content_type(&name).to_string());

    let mut events = manager.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            if let UploadEvent::Progress { file_id, progress } = event {
                info!(%file_id, progress, "upload progress");
            }
        }
    });

    let ticket = manager.start_upload(
        &config.session.identity(),
        &upload.project_id,
        upload.category,
        FileBlob::new(name, content_type, data),
    )?;
    info!(file_id = %ticket.file_id, path = %ticket.storage_path, "uploading");

    let outcome = ticket.wait().await?;
    println!("{} ({}) -> {}", outcome.file_id, format_bytes(outcome.size), outcome.url);

    Ok(())
}
