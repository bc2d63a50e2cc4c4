#![forbid(unsafe_code)]

use thiserror::Error;

/// Result type used by `spool-cache`.
pub type CacheResult<T> = Result<T, CacheError>;

/// Errors produced by the cache store and ledger.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ledger serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid range: start {start} >= end {end}")]
    InvalidRange { start: u64, end: u64 },
}

impl CacheError {
    pub fn is_serialization(&self) -> bool {
        matches!(self, Self::Serialization(_))
    }
}
