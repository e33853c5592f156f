use std::sync::Arc;

use tracing::{debug, instrument};

use crate::blob::BlobStore;
use crate::error::DavError;

/// Suffixes accepted for upload by default: HLS/DASH segment and manifest
/// files.
pub const DEFAULT_PUT_SUFFIXES: &[&str] = &[".ts", ".m4s", ".mp4", ".m3u8", ".mpd"];

/// Validates PUT targets and forwards accepted payloads to the blob store.
///
/// A disallowed suffix is rejected before the store is touched, so there
/// is never a partial write. Repeated PUTs to one path are
/// last-write-wins; any ordering comes from the store's own single-key
/// atomicity.
pub struct PutIngestor {
    store: Arc<dyn BlobStore>,
    allowed_suffixes: Vec<String>,
}

impl PutIngestor {
    /// Build an ingestor over `store` accepting the given suffixes
    /// (matched case-insensitively).
    pub fn new(store: Arc<dyn BlobStore>, allowed_suffixes: Vec<String>) -> Self {
        let allowed_suffixes = allowed_suffixes
            .into_iter()
            .map(|s| s.to_ascii_lowercase())
            .collect();
        Self {
            store,
            allowed_suffixes,
        }
    }

    /// Build an ingestor with the default segment/manifest allow-list.
    pub fn with_defaults(store: Arc<dyn BlobStore>) -> Self {
        Self::new(
            store,
            DEFAULT_PUT_SUFFIXES.iter().map(|s| s.to_string()).collect(),
        )
    }

    fn is_allowed(&self, path: &str) -> bool {
        let path = path.to_ascii_lowercase();
        self.allowed_suffixes.iter().any(|s| path.ends_with(s))
    }

    /// Store `body` under `path`.
    ///
    /// Returns only after the store has acknowledged the write; the 201
    /// the caller reports is backed by a completed `set`.
    #[instrument(skip(self, body), level = "debug", fields(body_len = body.len()))]
    pub async fn put(&self, path: &str, body: &[u8]) -> Result<(), DavError> {
        if !self.is_allowed(path) {
            return Err(DavError::MethodNotAllowed(format!(
                "PUT target {} has no allow-listed suffix",
                path
            )));
        }

        self.store.set(path, body).await?;
        debug!("Stored {} ({} bytes)", path, body.len());
        Ok(())
    }
}
