use std::collections::HashMap;
use parking_lot::RwLock;
use tokio::sync::broadcast;
use tracing::debug;
use super::types::{percentage, FileId, UploadEvent, UploadProgress, UploadStatus};

/// Progress entries of one upload manager, keyed by file id.
///
/// Terminal states latch: once an entry is `Success` or `Error` no later
/// update changes it.
pub struct ProgressStore {
    entries: RwLock<HashMap<FileId, UploadProgress>>,
    event_tx: broadcast::Sender<UploadEvent>,
}

impl ProgressStore {
    pub fn new(event_capacity: usize) -> Self {
        let (event_tx, _) = broadcast::channel(event_capacity.max(1));
        Self {
            entries: RwLock::new(HashMap::new()),
            event_tx,
        }
    }

    pub fn begin(&self, file_id: &FileId, total_bytes: u64) {
        self.entries.write().insert(file_id.clone(), UploadProgress::started(total_bytes));
        let _ = self.event_tx.send(UploadEvent::Started {
            file_id: file_id.clone(),
            total_bytes,
        });
    }

    /// Adjust the expected size before any bytes moved (e.g. after compression)
    pub fn set_total(&self, file_id: &FileId, total_bytes: u64) {
        if let Some(entry) = self.entries.write().get_mut(file_id) {
            if entry.status == UploadStatus::Uploading && entry.bytes_transferred == 0 {
                entry.total_bytes = total_bytes;
            }
        }
    }

    /// Record transferred bytes. Regressions are ignored.
    pub fn advance(&self, file_id: &FileId, bytes_transferred: u64) -> bool {
        let progress = {
            let mut entries = self.entries.write();
            let entry = match entries.get_mut(file_id) {
                Some(entry) if entry.status == UploadStatus::Uploading => entry,
                _ => return false,
            };

            if bytes_transferred <= entry.bytes_transferred {
                return false;
            }

            entry.bytes_transferred = bytes_transferred;
            let next = percentage(bytes_transferred, entry.total_bytes);
            if next <= entry.progress {
                return false;
            }
            entry.progress = next;
            next
        };

        let _ = self.event_tx.send(UploadEvent::Progress {
            file_id: file_id.clone(),
            progress,
        });
        true
    }

    pub fn succeed(&self, file_id: &FileId, url: &str) -> bool {
        {
            let mut entries = self.entries.write();
            let entry = match entries.get_mut(file_id) {
                Some(entry) if entry.status == UploadStatus::Uploading => entry,
                _ => return false,
            };
            entry.status = UploadStatus::Success;
            entry.progress = 100;
            entry.bytes_transferred = entry.total_bytes;
            entry.url = Some(url.to_string());
        }

        let _ = self.event_tx.send(UploadEvent::Succeeded {
            file_id: file_id.clone(),
            url: url.to_string(),
        });
        true
    }

    pub fn fail(&self, file_id: &FileId, error: &str) -> bool {
        {
            let mut entries = self.entries.write();
            let entry = match entries.get_mut(file_id) {
                Some(entry) if entry.status == UploadStatus::Uploading => entry,
                _ => {
                    debug!(%file_id, "ignoring failure for settled upload");
                    return false;
                }
            };
            entry.status = UploadStatus::Error;
            entry.error = Some(error.to_string());
        }

        let _ = self.event_tx.send(UploadEvent::Failed {
            file_id: file_id.clone(),
            error: error.to_string(),
        });
        true
    }

    pub fn get(&self, file_id: &FileId) -> Option<UploadProgress> {
        self.entries.read().get(file_id).cloned()
    }

    pub fn is_uploading(&self, file_id: &FileId) -> bool {
        self.entries
            .read()
            .get(file_id)
            .map(|entry| entry.status == UploadStatus::Uploading)
            .unwrap_or(false)
    }

    pub fn snapshot(&self) -> HashMap<FileId, UploadProgress> {
        self.entries.read().clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<UploadEvent> {
        self.event_tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_is_monotonic() {
        let store = ProgressStore::new(16);
        let id = FileId::from("1_a.png");
        store.begin(&id, 1000);

        assert!(store.advance(&id, 300));
        assert!(!store.advance(&id, 200));
        assert_eq!(store.get(&id).unwrap().progress, 30);
        assert!(store.advance(&id, 1000));
        assert_eq!(store.get(&id).unwrap().progress, 100);
    }

    #[test]
    fn test_terminal_state_latches() {
        let store = ProgressStore::new(16);
        let id = FileId::from("1_a.png");
        store.begin(&id, 10);

        assert!(store.fail(&id, "Upload cancelled by user"));
        assert!(!store.succeed(&id, "https://cdn/a.png"));
        assert!(!store.advance(&id, 10));

        let entry = store.get(&id).unwrap();
        assert_eq!(entry.status, UploadStatus::Error);
        assert_eq!(entry.url, None);
        assert_eq!(entry.error.as_deref(), Some("Upload cancelled by user"));
    }

    #[test]
    fn test_success_sets_url() {
        let store = ProgressStore::new(16);
        let id = FileId::from("1_a.png");
        store.begin(&id, 10);
        assert!(store.succeed(&id, "https://cdn/a.png"));

        let entry = store.get(&id).unwrap();
        assert_eq!(entry.status, UploadStatus::Success);
        assert_eq!(entry.progress, 100);
        assert_eq!(entry.url.as_deref(), Some("https://cdn/a.png"));
        assert!(entry.error.is_none());
    }

    #[tokio::test]
    async fn test_events_are_broadcast() {
        let store = ProgressStore::new(16);
        let mut rx = store.subscribe();
        let id = FileId::from("1_a.png");

        store.begin(&id, 4);
        store.advance(&id, 2);

        assert!(matches!(rx.recv().await.unwrap(), UploadEvent::Started { total_bytes: 4, .. }));
        assert!(matches!(rx.recv().await.unwrap(), UploadEvent::Progress { progress: 50, .. }));
    }
}
