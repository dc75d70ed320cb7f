//! Core error types

use thiserror::Error;

use crate::lifecycle::WorkerState;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Storage error: {0}")]
    Storage(#[from] swcache_storage::StorageError),

    #[error("Fetch error: {0}")]
    Proxy(#[from] swcache_proxy::ProxyError),

    #[error("Precache of {url} failed: {reason}")]
    Precache { url: String, reason: String },

    #[error("Invalid worker state: expected {expected}, found {actual}")]
    InvalidState {
        expected: WorkerState,
        actual: WorkerState,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}
