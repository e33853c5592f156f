//! Storage backends for segdav.
//!
//! Implements the `BlobStore` and `LockStore` capabilities from
//! `segdav-core`:
//! - `MemoryStore` / `MemoryLockStore`: in-process maps for tests and
//!   single-node dev deployments
//! - `LocalStore` / `FileLockStore`: one file per key under a base
//!   directory, written atomically via temp file + rename
//! - `RemoteKvStore`: REST key/value service client

mod local;
mod memory;
mod remote;

pub use local::{FileLockStore, LocalStore};
pub use memory::{MemoryLockStore, MemoryStore};
pub use remote::RemoteKvStore;
