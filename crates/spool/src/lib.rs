#![forbid(unsafe_code)]

//! # Spool
//!
//! Stream a remote video while caching every fetched byte range on disk.
//! Replays and seeks into downloaded regions are served from the cache, and
//! a later session resumes where the previous one stopped.
//!
//! ```ignore
//! use spool::prelude::*;
//!
//! let spool = Spool::new(SpoolConfig::new("/var/cache/spool"));
//! let player_url = spool.player_url(&url);
//! // The playback engine hands reads for `player_url` back to us:
//! let id = spool.handle_request(&player_url, request);
//! ```

pub mod cache {
    pub use spool_cache::*;
}

pub mod events {
    pub use spool_events::*;
}

pub mod loader {
    pub use spool_loader::*;
}

pub mod net {
    pub use spool_net::*;
}

mod config;
mod service;

pub use config::SpoolConfig;
pub use service::Spool;

pub mod prelude {
    pub use spool_cache::{CacheError, FragmentLedger, ResourceInfo};
    pub use spool_events::{CacheEvent, Event, PreloadEvent};
    pub use spool_loader::{
        BufferHealth, ContentInfo, DataRequest, ErrorSink, LoaderError, LoadingRequest,
    };

    pub use crate::{Spool, SpoolConfig};
}
