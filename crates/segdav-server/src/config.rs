use std::path::PathBuf;

use clap::Parser;
use segdav_core::{LockPolicy, DEFAULT_PUT_SUFFIXES};

/// Configuration for the segdav server.
#[derive(Parser, Debug, Clone)]
#[command(name = "segdav-server")]
#[command(about = "Minimal WebDAV endpoint for browsing a virtual tree and uploading media segments")]
pub struct Config {
    /// Host to bind to
    #[arg(long, default_value = "0.0.0.0", env = "SEGDAV_HOST")]
    pub host: String,

    /// Port to bind to
    #[arg(long, default_value = "8080", env = "SEGDAV_PORT")]
    pub port: u16,

    /// Blob store backend: memory, local or remote
    #[arg(long, default_value = "memory", env = "SEGDAV_STORE")]
    pub store: StoreBackend,

    /// Base directory for the local store (blobs and lock files)
    #[arg(long, env = "SEGDAV_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Base URL of the remote KV service (for --store remote)
    #[arg(long, env = "SEGDAV_REMOTE_KV_URL")]
    pub remote_kv_url: Option<String>,

    /// Bearer token for the remote KV service
    #[arg(long, env = "SEGDAV_REMOTE_KV_TOKEN")]
    pub remote_kv_token: Option<String>,

    /// Directory plain GET requests are served from
    #[arg(long, default_value = "public", env = "SEGDAV_STATIC_ROOT")]
    pub static_root: PathBuf,

    /// JSON file describing the resource registry (defaults to the
    /// built-in root + readme tree)
    #[arg(long, env = "SEGDAV_REGISTRY")]
    pub registry: Option<PathBuf>,

    /// Comma-separated suffixes accepted for PUT (defaults to segment
    /// and manifest extensions)
    #[arg(long, value_delimiter = ',', env = "SEGDAV_PUT_SUFFIXES")]
    pub put_suffixes: Vec<String>,

    /// LOCK behavior on an already-held path: refuse (exclusive) or
    /// re-issue (permissive)
    #[arg(long, default_value = "exclusive", env = "SEGDAV_LOCK_POLICY")]
    pub lock_policy: LockPolicyArg,

    /// Lock TTL in seconds
    #[arg(long, default_value = "600", env = "SEGDAV_LOCK_TTL_SECS")]
    pub lock_ttl_secs: u64,
}

impl Config {
    /// Get the effective local data directory.
    pub fn effective_data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(|| {
            dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("segdav")
        })
    }

    /// Get the effective PUT suffix allow-list.
    pub fn effective_put_suffixes(&self) -> Vec<String> {
        if self.put_suffixes.is_empty() {
            DEFAULT_PUT_SUFFIXES.iter().map(|s| s.to_string()).collect()
        } else {
            self.put_suffixes.clone()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum StoreBackend {
    Memory,
    Local,
    Remote,
}

impl std::fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreBackend::Memory => write!(f, "memory"),
            StoreBackend::Local => write!(f, "local"),
            StoreBackend::Remote => write!(f, "remote"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum LockPolicyArg {
    Exclusive,
    Permissive,
}

impl From<LockPolicyArg> for LockPolicy {
    fn from(arg: LockPolicyArg) -> Self {
        match arg {
            LockPolicyArg::Exclusive => LockPolicy::Exclusive,
            LockPolicyArg::Permissive => LockPolicy::Permissive,
        }
    }
}

impl std::fmt::Display for LockPolicyArg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LockPolicyArg::Exclusive => write!(f, "exclusive"),
            LockPolicyArg::Permissive => write!(f, "permissive"),
        }
    }
}
