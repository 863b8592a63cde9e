use std::collections::HashMap;
use std::sync::Arc;
use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::{broadcast, Semaphore};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use crate::compress::Compressor;
use super::errors::{Result, UploadError};
use super::progress::ProgressStore;
use super::traits::{BlobStorage, MetadataRecorder};
use super::types::{
    is_valid_project_id, storage_path, BlobPut, ContentCategory, FileBlob, FileId, Identity, NewFileRecord,
    ProgressSink, UploadEvent, UploadOutcome, UploadProgress,
};

#[derive(Debug, Clone)]
pub struct UploadManagerConfig {
    /// Broadcast buffer for upload events
    pub event_capacity: usize,
    /// Optional cap on transfers in flight; `None` means unbounded
    pub max_concurrent: Option<usize>,
}

impl Default for UploadManagerConfig {
    fn default() -> Self {
        Self {
            event_capacity: 256,
            max_concurrent: None,
        }
    }
}

/// Handle to an upload started with [`UploadManager::start_upload`]
pub struct UploadTicket {
    pub file_id: FileId,
    pub storage_path: String,
    join_handle: JoinHandle<Result<UploadOutcome>>,
}

impl UploadTicket {
    pub async fn wait(self) -> Result<UploadOutcome> {
        self.join_handle
            .await
            .map_err(|err| UploadError::internal(format!("Upload task panicked: {}", err)))?
    }
}

struct Inner {
    storage: Arc<dyn BlobStorage>,
    recorder: Arc<dyn MetadataRecorder>,
    compressor: Compressor,
    progress: ProgressStore,
    tasks: Mutex<HashMap<FileId, CancellationToken>>,
    last_issued_ms: Mutex<i64>,
    limiter: Option<Arc<Semaphore>>,
}

/// Moves files into blob storage and records their metadata.
///
/// Cheap to clone; clones share the same progress map and task handles.
#[derive(Clone)]
pub struct UploadManager {
    inner: Arc<Inner>,
}

impl UploadManager {
    pub fn new(storage: Arc<dyn BlobStorage>, recorder: Arc<dyn MetadataRecorder>) -> Self {
        Self::with_config(storage, recorder, Compressor::default(), UploadManagerConfig::default())
    }

    pub fn with_config(
        storage: Arc<dyn BlobStorage>,
        recorder: Arc<dyn MetadataRecorder>,
        compressor: Compressor,
        config: UploadManagerConfig,
    ) -> Self {
        let limiter = config.max_concurrent.map(|n| Arc::new(Semaphore::new(n.max(1))));

        Self {
            inner: Arc::new(Inner {
                storage,
                recorder,
                compressor,
                progress: ProgressStore::new(config.event_capacity),
                tasks: Mutex::new(HashMap::new()),
                last_issued_ms: Mutex::new(0),
                limiter,
            }),
        }
    }

    /// Start an upload in the background and return its ticket.
    ///
    /// Guest identities are rejected here, before any progress entry or
    /// network call exists. Must be called from within a Tokio runtime.
    pub fn start_upload(
        &self,
        identity: &Identity,
        project_id: &str,
        category: ContentCategory,
        file: FileBlob,
    ) -> Result<UploadTicket> {
        if identity.is_anonymous {
            warn!(user_id = %identity.user_id, "guest session attempted an upload");
            return Err(UploadError::Unauthenticated);
        }
        if project_id.trim().is_empty() {
            return Err(UploadError::InvalidInput("project id is empty".to_string()));
        }
        if !is_valid_project_id(project_id) {
            return Err(UploadError::InvalidInput(format!("invalid project id: {:?}", project_id)));
        }

        let file_id = self.next_file_id(&file.name);
        let path = storage_path(project_id, &file_id);
        let token = CancellationToken::new();

        self.inner.tasks.lock().insert(file_id.clone(), token.clone());
        self.inner.progress.begin(&file_id, file.size());

        info!(%file_id, project_id, ?category, size = file.size(), "upload started");

        let job = UploadJob {
            identity: identity.clone(),
            project_id: project_id.to_string(),
            category,
            file_id: file_id.clone(),
            path: path.clone(),
            token,
        };
        let join_handle = tokio::spawn(job.run(self.inner.clone(), file));

        Ok(UploadTicket {
            file_id,
            storage_path: path,
            join_handle,
        })
    }

    /// Start an upload and wait for it to settle
    pub async fn upload(
        &self,
        identity: &Identity,
        project_id: &str,
        category: ContentCategory,
        file: FileBlob,
    ) -> Result<UploadOutcome> {
        self.start_upload(identity, project_id, category, file)?.wait().await
    }

    /// Cancel an in-flight upload. Returns `false` when there is nothing to cancel.
    ///
    /// The progress entry is latched to `error` before the transfer is told to
    /// stop, so a job finishing concurrently can no longer mark it successful.
    pub fn cancel_upload(&self, file_id: &FileId) -> bool {
        let latched = self.inner.progress.fail(file_id, &UploadError::Cancelled.to_string());
        if let Some(token) = self.inner.tasks.lock().remove(file_id) {
            token.cancel();
        }

        if latched {
            info!(%file_id, "upload cancelled");
        }
        latched
    }

    pub fn progress(&self, file_id: &FileId) -> Option<UploadProgress> {
        self.inner.progress.get(file_id)
    }

    pub fn snapshot(&self) -> HashMap<FileId, UploadProgress> {
        self.inner.progress.snapshot()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<UploadEvent> {
        self.inner.progress.subscribe()
    }

    /// Ids are strictly increasing per manager even within one millisecond
    fn next_file_id(&self, file_name: &str) -> FileId {
        let now = Utc::now().timestamp_millis();
        let mut last = self.inner.last_issued_ms.lock();
        let issued = if now <= *last { *last + 1 } else { now };
        *last = issued;
        FileId::compose(issued, file_name)
    }
}

struct UploadJob {
    identity: Identity,
    project_id: String,
    category: ContentCategory,
    file_id: FileId,
    path: String,
    token: CancellationToken,
}

impl UploadJob {
    async fn run(self, inner: Arc<Inner>, file: FileBlob) -> Result<UploadOutcome> {
        let result = self.transfer(&inner, file).await;

        if let Err(err) = &result {
            inner.tasks.lock().remove(&self.file_id);
            if inner.progress.fail(&self.file_id, &err.to_string()) {
                warn!(file_id = %self.file_id, error = %err, "upload failed");
            }
        }

        result
    }

    async fn transfer(&self, inner: &Arc<Inner>, file: FileBlob) -> Result<UploadOutcome> {
        let _permit = match &inner.limiter {
            Some(limiter) => Some(
                limiter
                    .clone()
                    .acquire_owned()
                    .await
                    .map_err(|_| UploadError::internal("upload limiter closed"))?,
            ),
            None => None,
        };

        let file = match self.category {
            ContentCategory::Image => inner.compressor.compress(file).await,
            _ => file,
        };
        inner.progress.set_total(&self.file_id, file.size());

        if self.token.is_cancelled() {
            return Err(UploadError::Cancelled);
        }

        let sink: ProgressSink = {
            let inner = inner.clone();
            let file_id = self.file_id.clone();
            Arc::new(move |bytes| {
                inner.progress.advance(&file_id, bytes);
            })
        };

        let size = file.size();
        let request = BlobPut {
            project_id: self.project_id.clone(),
            path: self.path.clone(),
            file_name: file.name.clone(),
            content_type: file.content_type.clone(),
            data: file.data,
        };
        let url = inner.storage.put(request, sink, self.token.clone()).await?;

        // A completion that lands after cancel must not resurrect the upload
        if !inner.progress.is_uploading(&self.file_id) {
            debug!(file_id = %self.file_id, "transfer finished after cancellation, ignoring");
            return Err(UploadError::Cancelled);
        }

        let record = NewFileRecord {
            file_id: self.file_id.to_string(),
            url: url.clone(),
            name: file.name,
            content_type: file.content_type,
            size,
        };
        // The backend may still commit a write that was already sent
        let recorded = tokio::select! {
            biased;
            _ = self.token.cancelled() => return Err(UploadError::Cancelled),
            recorded = inner.recorder.record(&self.identity, &self.project_id, &record) => recorded,
        };
        if let Err(err) = recorded {
            // The blob stays in storage without a record
            warn!(file_id = %self.file_id, path = %self.path, "blob stored but metadata write failed");
            return Err(err);
        }

        inner.tasks.lock().remove(&self.file_id);
        if !inner.progress.succeed(&self.file_id, &url) {
            return Err(UploadError::Cancelled);
        }

        info!(file_id = %self.file_id, %url, "upload completed");

        Ok(UploadOutcome {
            file_id: self.file_id.clone(),
            storage_path: self.path.clone(),
            url,
            size,
        })
    }
}
