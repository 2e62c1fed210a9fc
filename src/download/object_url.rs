//! Process-local `blob:` URLs.
//!
//! The downloader fetches image data through these instead of a network
//! endpoint. A URL keeps its blob alive until it is revoked.

use crate::protocol::Blob;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

const SCHEME_PREFIX: &str = "blob:canvas-saver/";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectUrl(String);

impl ObjectUrl {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The URL → blob table. Cheap to clone; clones share the table.
#[derive(Debug, Clone, Default)]
pub struct ObjectUrls {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    next: AtomicU64,
    blobs: Mutex<HashMap<ObjectUrl, Arc<Blob>>>,
}

impl ObjectUrls {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&self, blob: Blob) -> ObjectUrl {
        let n = self.inner.next.fetch_add(1, Ordering::Relaxed) + 1;
        let url = ObjectUrl(format!("{}{}", SCHEME_PREFIX, n));
        self.lock().insert(url.clone(), Arc::new(blob));
        url
    }

    pub fn resolve(&self, url: &ObjectUrl) -> Option<Arc<Blob>> {
        self.lock().get(url).cloned()
    }

    /// Frees the blob behind `url`. Returns false if it was not live.
    pub fn revoke(&self, url: &ObjectUrl) -> bool {
        self.lock().remove(url).is_some()
    }

    pub fn live_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<ObjectUrl, Arc<Blob>>> {
        // A poisoned table is still a consistent map; keep serving it.
        self.inner
            .blobs
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
