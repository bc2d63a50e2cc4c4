#![forbid(unsafe_code)]

use std::sync::Arc;

use spool_cache::CacheError;
use spool_net::NetError;
use thiserror::Error;

pub type LoaderResult<T> = Result<T, LoaderError>;

/// Failure of a load, as seen by loading requests and the error sink.
#[derive(Clone, Debug, Error)]
pub enum LoaderError {
    /// Transport failure, timeout, HTTP status, or rejected response.
    #[error("network error: {0}")]
    Network(#[from] NetError),

    #[error("load cancelled")]
    Cancelled,

    /// Cache file create/open/read/write/truncate failure.
    #[error("storage error: {0}")]
    Storage(#[source] Arc<CacheError>),

    #[error("ledger serialization error: {0}")]
    Serialization(#[source] Arc<CacheError>),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl LoaderError {
    pub fn invalid_request<S: Into<String>>(msg: S) -> Self {
        Self::InvalidRequest(msg.into())
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl From<CacheError> for LoaderError {
    fn from(error: CacheError) -> Self {
        if error.is_serialization() {
            Self::Serialization(Arc::new(error))
        } else {
            Self::Storage(Arc::new(error))
        }
    }
}
