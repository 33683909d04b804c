use thiserror::Error;

use crate::api::FetchError;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Cache storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to encode or decode cache namespace {namespace}: {source}")]
    Serialization {
        namespace: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Cache storage lock poisoned")]
    LockPoisoned,

    #[error("Install failed for {path}: {reason}")]
    InstallFailed { path: String, reason: String },

    #[error("Network fetch failed: {0}")]
    Network(#[from] FetchError),
}
