use std::path::{Path, PathBuf};

use async_trait::async_trait;
use segdav_core::{BlobStore, LockRecord, LockStore, ReleaseOutcome, StoreError};
use tokio::fs;
use tracing::{debug, instrument, warn};

/// Turn a resource path key into a flat file name. The tree is one level
/// deep, so a key is `/` plus a single segment; anything else is
/// rejected rather than mapped onto the filesystem.
fn file_name_for(key: &str) -> Result<&str, StoreError> {
    let name = key.strip_prefix('/').unwrap_or(key);
    if name.is_empty() || name.contains('/') || name.contains("..") {
        return Err(StoreError::InvalidKey(key.to_string()));
    }
    Ok(name)
}

/// Local filesystem blob store: one file per key under `base_dir/blobs`.
///
/// Writes go through a temp file and a rename, so readers never observe
/// a partial value for a key.
#[derive(Debug, Clone)]
pub struct LocalStore {
    base_dir: PathBuf,
}

impl LocalStore {
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
        }
    }

    fn blobs_dir(&self) -> PathBuf {
        self.base_dir.join("blobs")
    }

    fn blob_path(&self, key: &str) -> Result<PathBuf, StoreError> {
        Ok(self.blobs_dir().join(file_name_for(key)?))
    }

    async fn ensure_blobs_dir(&self) -> Result<(), StoreError> {
        let dir = self.blobs_dir();
        fs::create_dir_all(&dir).await.map_err(|e| {
            StoreError::Io(format!("Failed to create blobs dir {}: {}", dir.display(), e))
        })
    }
}

#[async_trait]
impl BlobStore for LocalStore {
    fn store_name(&self) -> &'static str {
        "local"
    }

    #[instrument(skip(self), level = "debug")]
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let path = self.blob_path(key)?;
        match fs::read(&path).await {
            Ok(data) => {
                debug!("Loaded {} ({} bytes)", key, data.len());
                Ok(Some(data))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::Io(format!(
                "Failed to read {}: {}",
                path.display(),
                e
            ))),
        }
    }

    #[instrument(skip(self, bytes), level = "debug", fields(bytes_len = bytes.len()))]
    async fn set(&self, key: &str, bytes: &[u8]) -> Result<(), StoreError> {
        let path = self.blob_path(key)?;
        self.ensure_blobs_dir().await?;

        // Write atomically via temp file
        let temp_path = path.with_file_name(format!("{}.tmp", file_name_for(key)?));
        fs::write(&temp_path, bytes).await.map_err(|e| {
            StoreError::Io(format!("Failed to write {}: {}", temp_path.display(), e))
        })?;
        fs::rename(&temp_path, &path).await.map_err(|e| {
            StoreError::Io(format!("Failed to rename {}: {}", temp_path.display(), e))
        })?;

        debug!("Stored {} ({} bytes)", key, bytes.len());
        Ok(())
    }
}

/// File-based lock store: `{base_dir}/locks/{encoded}.lock`, where
/// `encoded` is the percent-encoded resource path. Encoding the whole
/// path keeps the root collection `/` lockable and makes file names
/// collision-free, since the encoding is injective.
///
/// The check-then-rename sequence is only best-effort exclusion between
/// processes; in-process callers racing on the same path should prefer
/// `MemoryLockStore`, which serializes under one mutex.
#[derive(Debug, Clone)]
pub struct FileLockStore {
    base_dir: PathBuf,
}

impl FileLockStore {
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
        }
    }

    fn locks_dir(&self) -> PathBuf {
        self.base_dir.join("locks")
    }

    fn lock_path(&self, path: &str) -> PathBuf {
        self.locks_dir()
            .join(format!("{}.lock", urlencoding::encode(path)))
    }

    /// Read the current record, if it exists and hasn't expired.
    async fn read_record(&self, path: &str) -> Result<Option<LockRecord>, StoreError> {
        let lock_path = self.lock_path(path);
        let content = match fs::read_to_string(&lock_path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(StoreError::Io(format!(
                    "Failed to read lock file {}: {}",
                    lock_path.display(),
                    e
                )))
            }
        };

        match serde_json::from_str::<LockRecord>(&content) {
            Ok(record) => {
                let now = chrono::Utc::now().timestamp();
                if record.is_active(now) {
                    Ok(Some(record))
                } else {
                    // Lock expired, clean it up
                    let _ = fs::remove_file(&lock_path).await;
                    Ok(None)
                }
            }
            Err(e) => {
                warn!("Failed to parse lock file {}: {}", lock_path.display(), e);
                // Corrupted lock file, remove it
                let _ = fs::remove_file(&lock_path).await;
                Ok(None)
            }
        }
    }

    async fn write_record(&self, path: &str, record: &LockRecord) -> Result<(), StoreError> {
        let dir = self.locks_dir();
        fs::create_dir_all(&dir).await.map_err(|e| {
            StoreError::Io(format!("Failed to create locks dir {}: {}", dir.display(), e))
        })?;

        let lock_path = self.lock_path(path);
        let temp_path = lock_path.with_extension("lock.tmp");

        let content = serde_json::to_string(record)
            .map_err(|e| StoreError::Serialization(format!("Failed to serialize lock: {}", e)))?;

        fs::write(&temp_path, &content)
            .await
            .map_err(|e| StoreError::Io(format!("Failed to write lock file: {}", e)))?;
        fs::rename(&temp_path, &lock_path)
            .await
            .map_err(|e| StoreError::Io(format!("Failed to rename lock file: {}", e)))?;

        Ok(())
    }
}

#[async_trait]
impl LockStore for FileLockStore {
    #[instrument(skip(self, record), level = "debug")]
    async fn try_insert(&self, path: &str, record: LockRecord) -> Result<bool, StoreError> {
        if self.read_record(path).await?.is_some() {
            debug!("Lock file for {} already present", path);
            return Ok(false);
        }
        self.write_record(path, &record).await?;
        Ok(true)
    }

    #[instrument(skip(self, record), level = "debug")]
    async fn put(&self, path: &str, record: LockRecord) -> Result<(), StoreError> {
        self.write_record(path, &record).await
    }

    #[instrument(skip(self), level = "debug")]
    async fn remove(&self, path: &str, token: &str) -> Result<ReleaseOutcome, StoreError> {
        match self.read_record(path).await? {
            Some(record) if record.token == token => {
                let lock_path = self.lock_path(path);
                fs::remove_file(&lock_path)
                    .await
                    .map_err(|e| StoreError::Io(format!("Failed to remove lock file: {}", e)))?;
                debug!("Removed lock file for {}", path);
                Ok(ReleaseOutcome::Released)
            }
            _ => Ok(ReleaseOutcome::NoSuchLock),
        }
    }
}
