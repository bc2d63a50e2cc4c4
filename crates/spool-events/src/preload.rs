#![forbid(unsafe_code)]

use url::Url;

/// Preload queue notifications.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PreloadEvent {
    /// Warm-up of `url` began with less than the budget already cached.
    Started { url: Url },
    /// The in-flight warm-up was suspended.
    Paused { url: Url },
    /// Warm-up ended; `error` is `None` on success.
    Finished { url: Url, error: Option<String> },
}

impl PreloadEvent {
    pub fn url(&self) -> &Url {
        match self {
            Self::Started { url } | Self::Paused { url } | Self::Finished { url, .. } => url,
        }
    }
}
