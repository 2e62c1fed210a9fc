//! Filesystem downloader: writes object URL contents into a directory.
//!
//! Reports `InProgress` as soon as a download is accepted, then `Complete`
//! or `Interrupted` once the bytes are on disk, over the same channel the
//! background listens to for host download events.

use super::{
    DownloadDelta, DownloadError, DownloadId, DownloadOptions, DownloadState, Downloader,
    ObjectUrls,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc::UnboundedSender;

pub struct FsDownloader {
    dir: PathBuf,
    urls: ObjectUrls,
    events: UnboundedSender<DownloadDelta>,
    next_id: AtomicU64,
}

impl FsDownloader {
    pub fn new(
        dir: impl Into<PathBuf>,
        urls: ObjectUrls,
        events: UnboundedSender<DownloadDelta>,
    ) -> Self {
        Self {
            dir: dir.into(),
            urls,
            events,
            next_id: AtomicU64::new(1),
        }
    }

    /// The user's download directory, or the working directory.
    pub fn default_dir() -> PathBuf {
        dirs::download_dir().unwrap_or_else(|| PathBuf::from("."))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn emit(&self, id: DownloadId, state: DownloadState) {
        if self.events.send(DownloadDelta { id, state }).is_err() {
            log::debug!("[DOWNLOAD] Nobody listening for #{} → {:?}", id, state);
        }
    }
}

impl Downloader for FsDownloader {
    async fn download(&self, options: DownloadOptions) -> Result<DownloadId, DownloadError> {
        let blob = self
            .urls
            .resolve(&options.url)
            .ok_or_else(|| DownloadError::UnknownUrl(options.url.clone()))?;
        validate_filename(&options.filename)?;
        std::fs::create_dir_all(&self.dir)?;

        let target = if options.save_as {
            unique_path(&self.dir, &options.filename)
        } else {
            self.dir.join(&options.filename)
        };

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.emit(id, DownloadState::InProgress);

        match std::fs::write(&target, &blob.data) {
            Ok(()) => {
                log::info!("[DOWNLOAD] #{} saved to {}", id, target.display());
                self.emit(id, DownloadState::Complete);
            }
            Err(e) => {
                log::error!("[DOWNLOAD] #{} failed writing {}: {}", id, target.display(), e);
                self.emit(id, DownloadState::Interrupted);
            }
        }

        Ok(id)
    }
}

fn validate_filename(name: &str) -> Result<(), DownloadError> {
    let path = Path::new(name);
    let single_component = path.components().count() == 1 && path.file_name().is_some();
    if name.is_empty() || !single_component {
        return Err(DownloadError::InvalidFilename(name.to_string()));
    }
    Ok(())
}

/// `name.ext`, or `name (1).ext`, `name (2).ext`, ... if taken.
fn unique_path(dir: &Path, filename: &str) -> PathBuf {
    let candidate = dir.join(filename);
    if !candidate.exists() {
        return candidate;
    }

    let path = Path::new(filename);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = path.extension().map(|e| e.to_string_lossy().into_owned());

    (1..)
        .map(|n| match &ext {
            Some(ext) => dir.join(format!("{} ({}).{}", stem, n, ext)),
            None => dir.join(format!("{} ({})", stem, n)),
        })
        .find(|p| !p.exists())
        .unwrap_or(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Blob;
    use tokio::sync::mpsc;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "canvas-saver-fs-{}-{}",
            name,
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    #[tokio::test]
    async fn writes_file_and_reports_progress_then_complete() {
        let dir = scratch_dir("write");
        let urls = ObjectUrls::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let downloader = FsDownloader::new(&dir, urls.clone(), tx);

        let url = urls.create(Blob::new("image/png", vec![1, 2, 3]));
        let id = downloader
            .download(DownloadOptions {
                url,
                filename: "canvas_image.png".into(),
                save_as: true,
            })
            .await
            .unwrap();

        assert_eq!(std::fs::read(dir.join("canvas_image.png")).unwrap(), vec![1, 2, 3]);
        assert_eq!(rx.recv().await, Some(DownloadDelta { id, state: DownloadState::InProgress }));
        assert_eq!(rx.recv().await, Some(DownloadDelta { id, state: DownloadState::Complete }));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn save_as_never_overwrites() {
        let dir = scratch_dir("unique");
        let urls = ObjectUrls::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let downloader = FsDownloader::new(&dir, urls.clone(), tx);

        for byte in [1u8, 2, 3] {
            let url = urls.create(Blob::new("image/png", vec![byte]));
            downloader
                .download(DownloadOptions {
                    url,
                    filename: "shot.png".into(),
                    save_as: true,
                })
                .await
                .unwrap();
        }

        assert_eq!(std::fs::read(dir.join("shot.png")).unwrap(), vec![1]);
        assert_eq!(std::fs::read(dir.join("shot (1).png")).unwrap(), vec![2]);
        assert_eq!(std::fs::read(dir.join("shot (2).png")).unwrap(), vec![3]);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn revoked_url_cannot_be_downloaded() {
        let dir = scratch_dir("revoked");
        let urls = ObjectUrls::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let downloader = FsDownloader::new(&dir, urls.clone(), tx);

        let url = urls.create(Blob::new("image/png", vec![1]));
        urls.revoke(&url);
        let result = downloader
            .download(DownloadOptions {
                url,
                filename: "x.png".into(),
                save_as: false,
            })
            .await;
        assert!(matches!(result, Err(DownloadError::UnknownUrl(_))));
    }

    #[test]
    fn filenames_must_be_a_single_component() {
        assert!(validate_filename("canvas-1.png").is_ok());
        assert!(validate_filename("../escape.png").is_err());
        assert!(validate_filename("dir/file.png").is_err());
        assert!(validate_filename("").is_err());
    }
}
