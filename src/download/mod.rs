//! Download manager: save blobs, reclaim their object URLs on completion.
//!
//! The pending table (`download id → object URL`) is owned by the manager
//! alone and only touched from the background event loop:
//! - insert when the host accepts a download,
//! - remove (and revoke) when the host reports that download complete.
//! Interrupted or cancelled downloads keep their URL until `release_all`.

mod fs;
mod object_url;

pub use fs::FsDownloader;
pub use object_url::{ObjectUrl, ObjectUrls};

use crate::protocol::Blob;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;

pub type DownloadId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadState {
    InProgress,
    Interrupted,
    /// The user dismissed the save dialog or aborted the transfer.
    Cancelled,
    Complete,
}

/// A lifecycle change reported by the host for one download.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadDelta {
    pub id: DownloadId,
    pub state: DownloadState,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadOptions {
    pub url: ObjectUrl,
    pub filename: String,
    /// Ask for a destination instead of saving silently.
    pub save_as: bool,
}

/// Host capability: start saving a URL to disk.
pub trait Downloader {
    fn download(
        &self,
        options: DownloadOptions,
    ) -> impl Future<Output = Result<DownloadId, DownloadError>>;
}

pub struct DownloadManager<D> {
    downloader: D,
    urls: ObjectUrls,
    pending: HashMap<DownloadId, ObjectUrl>,
}

impl<D: Downloader> DownloadManager<D> {
    pub fn new(downloader: D, urls: ObjectUrls) -> Self {
        Self {
            downloader,
            urls,
            pending: HashMap::new(),
        }
    }

    /// Starts saving `blob` as `filename` and tracks its object URL.
    ///
    /// The URL is not revoked here; the download still has to read it.
    pub async fn save_blob(
        &mut self,
        blob: Blob,
        filename: &str,
    ) -> Result<DownloadId, DownloadError> {
        let size = blob.len();
        let url = self.urls.create(blob);

        let options = DownloadOptions {
            url: url.clone(),
            filename: filename.to_string(),
            save_as: true,
        };

        match self.downloader.download(options).await {
            Ok(id) => {
                log::info!(
                    "[DOWNLOAD] Started #{} for {} ({} bytes via {})",
                    id,
                    filename,
                    size,
                    url
                );
                self.pending.insert(id, url);
                Ok(id)
            }
            Err(e) => {
                // Never handed to the host, so nothing else will read it.
                self.urls.revoke(&url);
                Err(e)
            }
        }
    }

    /// Handles a host lifecycle event. Returns true if a URL was released.
    pub fn on_download_changed(&mut self, delta: DownloadDelta) -> bool {
        if delta.state != DownloadState::Complete {
            log::debug!("[DOWNLOAD] #{} is now {:?}", delta.id, delta.state);
            return false;
        }

        match self.pending.remove(&delta.id) {
            Some(url) => {
                self.urls.revoke(&url);
                log::info!("[DOWNLOAD] #{} complete, released {}", delta.id, url);
                true
            }
            None => false,
        }
    }

    /// Revokes every outstanding URL. Used when the background shuts down.
    pub fn release_all(&mut self) -> usize {
        let count = self.pending.len();
        for (id, url) in self.pending.drain() {
            log::debug!("[DOWNLOAD] Releasing {} for unfinished #{}", url, id);
            self.urls.revoke(&url);
        }
        if count > 0 {
            log::warn!("[DOWNLOAD] Released {} unfinished download URL(s)", count);
        }
        count
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn is_pending(&self, id: DownloadId) -> bool {
        self.pending.contains_key(&id)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error("Object URL {0} is not live")]
    UnknownUrl(ObjectUrl),

    #[error("Invalid download filename '{0}'")]
    InvalidFilename(String),

    #[error("Could not write download: {0}")]
    Io(#[from] std::io::Error),

    #[error("Download rejected: {0}")]
    Rejected(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};

    /// Accepts every download with sequential ids, recording the options.
    #[derive(Default)]
    struct RecordingDownloader {
        next: Cell<DownloadId>,
        seen: RefCell<Vec<DownloadOptions>>,
        reject: bool,
    }

    impl Downloader for RecordingDownloader {
        async fn download(&self, options: DownloadOptions) -> Result<DownloadId, DownloadError> {
            if self.reject {
                return Err(DownloadError::Rejected("disk full".into()));
            }
            self.seen.borrow_mut().push(options);
            self.next.set(self.next.get() + 1);
            Ok(self.next.get())
        }
    }

    fn blob() -> Blob {
        Blob::new("image/png", vec![0x89, b'P', b'N', b'G'])
    }

    #[tokio::test]
    async fn save_keeps_url_alive_until_complete() {
        let urls = ObjectUrls::new();
        let mut manager = DownloadManager::new(RecordingDownloader::default(), urls.clone());

        let id = manager.save_blob(blob(), "canvas_image.png").await.unwrap();
        assert!(manager.is_pending(id));
        assert_eq!(urls.live_count(), 1);

        let seen = manager.downloader.seen.borrow().clone();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].filename, "canvas_image.png");
        assert!(seen[0].save_as);
        assert!(urls.resolve(&seen[0].url).is_some());

        assert!(manager.on_download_changed(DownloadDelta {
            id,
            state: DownloadState::Complete
        }));
        assert_eq!(urls.live_count(), 0);
        assert_eq!(manager.pending_count(), 0);

        // A repeated completion releases nothing more.
        assert!(!manager.on_download_changed(DownloadDelta {
            id,
            state: DownloadState::Complete
        }));
    }

    #[tokio::test]
    async fn non_complete_states_release_nothing() {
        let urls = ObjectUrls::new();
        let mut manager = DownloadManager::new(RecordingDownloader::default(), urls.clone());
        let id = manager.save_blob(blob(), "a.png").await.unwrap();

        for state in [
            DownloadState::InProgress,
            DownloadState::Interrupted,
            DownloadState::Cancelled,
        ] {
            assert!(!manager.on_download_changed(DownloadDelta { id, state }));
        }
        assert!(manager.is_pending(id));
        assert_eq!(urls.live_count(), 1);
    }

    #[tokio::test]
    async fn completion_of_unknown_download_is_ignored() {
        let urls = ObjectUrls::new();
        let mut manager = DownloadManager::new(RecordingDownloader::default(), urls.clone());
        let id = manager.save_blob(blob(), "a.png").await.unwrap();

        assert!(!manager.on_download_changed(DownloadDelta {
            id: id + 100,
            state: DownloadState::Complete
        }));
        assert_eq!(urls.live_count(), 1);
    }

    #[tokio::test]
    async fn concurrent_saves_are_tracked_independently() {
        let urls = ObjectUrls::new();
        let mut manager = DownloadManager::new(RecordingDownloader::default(), urls.clone());
        let first = manager.save_blob(blob(), "a.png").await.unwrap();
        let second = manager.save_blob(blob(), "a.png").await.unwrap();
        assert_ne!(first, second);

        manager.on_download_changed(DownloadDelta {
            id: second,
            state: DownloadState::Complete,
        });
        assert!(manager.is_pending(first));
        assert_eq!(urls.live_count(), 1);
    }

    #[tokio::test]
    async fn rejected_save_leaves_no_record_and_no_url() {
        let urls = ObjectUrls::new();
        let downloader = RecordingDownloader {
            reject: true,
            ..Default::default()
        };
        let mut manager = DownloadManager::new(downloader, urls.clone());

        assert!(manager.save_blob(blob(), "a.png").await.is_err());
        assert_eq!(manager.pending_count(), 0);
        assert_eq!(urls.live_count(), 0);
    }

    #[tokio::test]
    async fn release_all_revokes_outstanding_urls() {
        let urls = ObjectUrls::new();
        let mut manager = DownloadManager::new(RecordingDownloader::default(), urls.clone());
        manager.save_blob(blob(), "a.png").await.unwrap();
        manager.save_blob(blob(), "b.png").await.unwrap();

        assert_eq!(manager.release_all(), 2);
        assert_eq!(urls.live_count(), 0);
        assert_eq!(manager.pending_count(), 0);
    }

    #[tokio::test]
    async fn cancelled_download_is_released_at_shutdown() {
        let urls = ObjectUrls::new();
        let mut manager = DownloadManager::new(RecordingDownloader::default(), urls.clone());
        let id = manager.save_blob(blob(), "a.png").await.unwrap();

        assert!(!manager.on_download_changed(DownloadDelta {
            id,
            state: DownloadState::Cancelled
        }));
        assert_eq!(urls.live_count(), 1);

        assert_eq!(manager.release_all(), 1);
        assert_eq!(urls.live_count(), 0);
    }
}
