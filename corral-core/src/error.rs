//! Error types for corral

use thiserror::Error;

/// Result type alias
pub type CorralResult<T> = Result<T, CorralError>;

/// Main error type
#[derive(Error, Debug)]
pub enum CorralError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Timeout")]
    Timeout,

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Storage quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("Corrupted cache entry: {0}")]
    CorruptedEntry(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Lifecycle error: {0}")]
    Lifecycle(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Offline and no cached version")]
    OfflineNoCache,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl CorralError {
    /// True for failures caused by the network being unreachable. These are
    /// the failures the cache fallback and the sync queue absorb; they are
    /// never surfaced as fatal to the caller.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, CorralError::Network(_) | CorralError::Timeout)
    }

    /// True for failures worth retrying at a later point.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CorralError::Network(_) | CorralError::Timeout | CorralError::OfflineNoCache
        )
    }

    /// True for cache-store failures that must propagate rather than be
    /// masked by stale data.
    pub fn is_storage(&self) -> bool {
        matches!(
            self,
            CorralError::Storage(_)
                | CorralError::QuotaExceeded(_)
                | CorralError::CorruptedEntry(_)
        )
    }
}
