#![forbid(unsafe_code)]

//! Shared test utilities for the spool workspace.

pub mod media_server;
pub mod pattern;

pub use media_server::{MediaRoute, MediaServer, ServerLog};
pub use pattern::pattern_bytes;
