use thiserror::Error;

/// Errors that can occur in the protocol layer.
///
/// Each variant maps to exactly one wire status: `NotFound` to 404,
/// `MethodNotAllowed` to 405, `Locked` to 423. Store failures are not
/// masked and surface as 5xx; retry policy belongs to the caller.
#[derive(Error, Debug)]
pub enum DavError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Method not allowed: {0}")]
    MethodNotAllowed(String),

    #[error("Locked: {0}")]
    Locked(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Errors that can occur in the storage layer.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Remote store error: {0}")]
    Remote(String),
}

/// Errors raised while validating a static resource registry.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Registry has no root collection at /")]
    MissingRoot,

    #[error("Duplicate resource path: {0}")]
    DuplicatePath(String),

    #[error("Resource path must be absolute: {0}")]
    RelativePath(String),

    #[error("Resource is nested deeper than one segment: {0}")]
    NestedPath(String),

    #[error("Only the root may be a collection: {0}")]
    NonRootCollection(String),
}
