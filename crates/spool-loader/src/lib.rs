#![forbid(unsafe_code)]

//! `spool-loader`
//!
//! Turns player read requests into cache reads and ranged HTTP fetches:
//! - [`RangeDownloader`] executes a planned action sequence for one store.
//! - [`RequestBridge`] adapts a [`LoadingRequest`] onto a downloader.
//! - [`ResourceRegistry`] dedups requests per URL onto a shared store.
//! - [`PreloadQueue`] warms the head of queued resources in the background.

mod bridge;
mod context;
mod downloader;
mod error;
mod loader_url;
mod options;
mod preload;
mod registry;
mod request;
mod sink;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use bridge::{BridgeExit, RequestBridge};
pub use context::LoaderContext;
pub use downloader::{DownloadEvent, DownloaderState, RangeDownloader};
pub use error::{LoaderError, LoaderResult};
pub use loader_url::{LOADER_PREFIX, is_loader_url, loader_url, resolve_loader_url};
pub use options::{HeaderHook, LoaderOptions};
pub use preload::{BufferHealth, PreloadQueue};
pub use registry::{ActiveResources, BridgeId, ResourceRegistry};
pub use request::{ContentInfo, DataRequest, LoadingRequest};
pub use sink::ErrorSink;
