#![forbid(unsafe_code)]

//! Configuration for [`Spool`](crate::Spool).

use std::{path::PathBuf, time::Duration};

use spool_cache::DEFAULT_PACKAGE_SIZE;
use spool_loader::{ErrorSink, HeaderHook, LoaderOptions};
use spool_net::{Headers, NetOptions};
use url::Url;

/// Cached bytes after which playback can start without stalling.
pub const ENOUGH_TO_PLAY: u64 = 768 * 1024;

/// Settings for a [`Spool`](crate::Spool) service.
///
/// ```ignore
/// let config = SpoolConfig::new("/var/cache/spool")
///     .with_preload_budget(2 * 1024 * 1024)
///     .with_request_timeout(Duration::from_secs(30));
/// ```
#[derive(Clone, Debug)]
pub struct SpoolConfig {
    /// Directory holding data files and their `.cfg` ledgers.
    pub cache_dir: PathBuf,
    /// Largest single cache read served to the player.
    pub package_size: u64,
    /// Downloader, preload and header settings.
    pub loader: LoaderOptions,
    /// HTTP client settings, including the per-request timeout.
    pub net: NetOptions,
    /// Threshold of [`Spool::is_enough_to_play`](crate::Spool::is_enough_to_play).
    pub enough_to_play: u64,
    pub error_sink: ErrorSink,
    pub events_channel_capacity: usize,
}

impl Default for SpoolConfig {
    fn default() -> Self {
        Self::new(std::env::temp_dir().join("spool"))
    }
}

impl SpoolConfig {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            package_size: DEFAULT_PACKAGE_SIZE,
            loader: LoaderOptions::default(),
            net: NetOptions::default(),
            enough_to_play: ENOUGH_TO_PLAY,
            error_sink: ErrorSink::default(),
            events_channel_capacity: 256,
        }
    }

    #[must_use]
    pub fn with_package_size(mut self, size: u64) -> Self {
        self.package_size = size;
        self
    }

    #[must_use]
    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.loader = self.loader.with_buffer_size(size);
        self
    }

    #[must_use]
    pub fn with_preload_budget(mut self, budget: u64) -> Self {
        self.loader = self.loader.with_preload_budget(budget);
        self
    }

    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.net = self.net.with_request_timeout(timeout);
        self
    }

    /// Add headers to every request for matching resources.
    #[must_use]
    pub fn with_header_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Url) -> Option<Headers> + Send + Sync + 'static,
    {
        self.loader = self.loader.with_header_hook(hook);
        self
    }

    #[must_use]
    pub fn with_error_sink(mut self, sink: ErrorSink) -> Self {
        self.error_sink = sink;
        self
    }

    #[must_use]
    pub fn with_enough_to_play(mut self, bytes: u64) -> Self {
        self.enough_to_play = bytes;
        self
    }

    #[must_use]
    pub fn with_events_channel_capacity(mut self, capacity: usize) -> Self {
        self.events_channel_capacity = capacity;
        self
    }

    pub fn header_hook(&self) -> Option<&HeaderHook> {
        self.loader.header_hook.as_ref()
    }
}
