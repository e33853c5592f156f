//! Core protocol layer for segdav, a minimal WebDAV (RFC 4918) endpoint
//! for browsing a small virtual resource tree and uploading
//! streaming-media segments.
//!
//! This crate defines the protocol semantics and the capability seams the
//! server wires up:
//! - `ResourceRegistry`: the static virtual tree (collections, files)
//! - `multistatus`: deterministic DAV-namespace XML encoding
//! - `LockManager` / `LockStore` / `TokenSource`: opaque lock lifecycle
//! - `BlobStore`: the external key/value byte store PUT forwards to
//! - `Dispatcher`: request routing by `(method, path)`
//!
//! The HTTP transport, the concrete storage technology, and static-file
//! GET serving all live outside this crate.

mod blob;
mod dispatch;
mod error;
mod ingest;
mod lock;
mod multistatus;
mod resource;

pub use blob::BlobStore;
pub use dispatch::{
    DavRequest, DavResponse, Depth, Dispatch, Dispatcher, ALLOWED_METHODS, DAV_COMPLIANCE,
};
pub use error::{DavError, RegistryError, StoreError};
pub use ingest::{PutIngestor, DEFAULT_PUT_SUFFIXES};
pub use lock::{
    LockManager, LockPolicy, LockRecord, LockStore, LockToken, ReleaseOutcome, TokenSource,
    UuidTokenSource, DEFAULT_LOCK_TTL,
};
pub use multistatus::{
    lock_discovery, multistatus, MultistatusEntry, DEFAULT_QUOTA_AVAILABLE_BYTES,
};
pub use resource::{Resource, ResourceRegistry, StaticRegistry};
