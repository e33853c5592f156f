use async_trait::async_trait;

use crate::error::StoreError;

/// Key/value blob store capability.
///
/// The protocol layer depends only on this contract, never on a concrete
/// storage technology. Keys are resource path strings; values are raw
/// bytes. A single-key write is atomic at the store's discretion;
/// concurrent writes to one key are last-write-wins.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Returns the store identifier (e.g., "memory", "local", "remote").
    fn store_name(&self) -> &'static str;

    /// Read the bytes stored under `key`, or `None` when absent.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Write `bytes` under `key`, replacing any prior value.
    async fn set(&self, key: &str, bytes: &[u8]) -> Result<(), StoreError>;
}
