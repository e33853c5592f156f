use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use segdav_core::{BlobStore, LockRecord, LockStore, ReleaseOutcome, StoreError};
use tracing::debug;

/// In-memory blob store.
///
/// Single-key atomicity comes from the map mutex; nothing survives a
/// restart. Intended for tests and dev deployments.
#[derive(Debug, Default)]
pub struct MemoryStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BlobStore for MemoryStore {
    fn store_name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.blobs.lock().unwrap().get(key).cloned())
    }

    async fn set(&self, key: &str, bytes: &[u8]) -> Result<(), StoreError> {
        debug!("Stored {} ({} bytes)", key, bytes.len());
        self.blobs
            .lock()
            .unwrap()
            .insert(key.to_string(), bytes.to_vec());
        Ok(())
    }
}

/// In-memory lock store.
///
/// `try_insert` checks and inserts under one mutex guard, which is the
/// compare-and-set that keeps the one-active-token invariant for
/// concurrent in-process callers.
#[derive(Debug, Default)]
pub struct MemoryLockStore {
    records: Mutex<HashMap<String, LockRecord>>,
}

impl MemoryLockStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LockStore for MemoryLockStore {
    async fn try_insert(&self, path: &str, record: LockRecord) -> Result<bool, StoreError> {
        let mut records = self.records.lock().unwrap();
        let now = chrono::Utc::now().timestamp();
        if records.get(path).is_some_and(|r| r.is_active(now)) {
            return Ok(false);
        }
        records.insert(path.to_string(), record);
        Ok(true)
    }

    async fn put(&self, path: &str, record: LockRecord) -> Result<(), StoreError> {
        self.records
            .lock()
            .unwrap()
            .insert(path.to_string(), record);
        Ok(())
    }

    async fn remove(&self, path: &str, token: &str) -> Result<ReleaseOutcome, StoreError> {
        let mut records = self.records.lock().unwrap();
        let now = chrono::Utc::now().timestamp();
        match records.get(path) {
            Some(r) if r.token == token && r.is_active(now) => {
                records.remove(path);
                Ok(ReleaseOutcome::Released)
            }
            _ => Ok(ReleaseOutcome::NoSuchLock),
        }
    }
}
