#![forbid(unsafe_code)]

use spool_cache::FragmentLedger;
use url::Url;

use crate::TransferStats;

/// Download notifications from range downloaders.
#[derive(Clone, Debug, PartialEq)]
pub enum CacheEvent {
    /// Throttled snapshot of the ledger while a remote transfer runs.
    DownloadProgress { url: Url, ledger: FragmentLedger },
    /// A remote transfer ended. `error` is `None` on success.
    DownloadFinished {
        url: Url,
        ledger: FragmentLedger,
        stats: TransferStats,
        error: Option<String>,
    },
}

impl CacheEvent {
    pub fn url(&self) -> &Url {
        match self {
            Self::DownloadProgress { url, .. } | Self::DownloadFinished { url, .. } => url,
        }
    }

    pub fn ledger(&self) -> &FragmentLedger {
        match self {
            Self::DownloadProgress { ledger, .. } | Self::DownloadFinished { ledger, .. } => ledger,
        }
    }
}
