#![forbid(unsafe_code)]

//! Event bus for the spool cache and loaders.

mod bus;
mod cache;
mod event;
mod preload;
mod stats;

pub use bus::EventBus;
pub use cache::CacheEvent;
pub use event::Event;
pub use preload::PreloadEvent;
pub use stats::TransferStats;
