#![forbid(unsafe_code)]

use std::{fmt, sync::Arc, time::Duration};

use spool_net::Headers;
use url::Url;

/// Extra request headers for a resource, e.g. auth tokens.
pub type HeaderHook = Arc<dyn Fn(&Url) -> Option<Headers> + Send + Sync>;

/// Tuning for downloaders and the preload queue.
#[derive(Clone)]
pub struct LoaderOptions {
    /// Network bytes are coalesced into writes of about this size.
    pub buffer_size: usize,
    /// Minimum spacing of progress events during a remote transfer.
    pub progress_interval: Duration,
    /// Bytes warmed per preloaded resource.
    pub preload_budget: u64,
    pub header_hook: Option<HeaderHook>,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            buffer_size: 256 * 1024,
            progress_interval: Duration::from_millis(100),
            preload_budget: 1024 * 1024,
            header_hook: None,
        }
    }
}

impl LoaderOptions {
    #[must_use]
    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size.max(1);
        self
    }

    #[must_use]
    pub fn with_progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval = interval;
        self
    }

    #[must_use]
    pub fn with_preload_budget(mut self, budget: u64) -> Self {
        self.preload_budget = budget;
        self
    }

    #[must_use]
    pub fn with_header_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Url) -> Option<Headers> + Send + Sync + 'static,
    {
        self.header_hook = Some(Arc::new(hook));
        self
    }

    pub(crate) fn headers_for(&self, url: &Url) -> Option<Headers> {
        self.header_hook.as_ref().and_then(|hook| hook(url))
    }
}

impl fmt::Debug for LoaderOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoaderOptions")
            .field("buffer_size", &self.buffer_size)
            .field("progress_interval", &self.progress_interval)
            .field("preload_budget", &self.preload_budget)
            .field("header_hook", &self.header_hook.is_some())
            .finish()
    }
}
