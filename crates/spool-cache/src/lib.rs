#![forbid(unsafe_code)]

//! `spool-cache`
//!
//! Persistent byte-range cache for a single remote resource:
//! - [`FragmentLedger`] records which byte ranges of the data file are filled
//!   and is persisted next to it as `<data-file>.cfg`.
//! - [`plan_actions`] splits a requested range into [`Action`]s served from
//!   disk or fetched from the network.
//! - [`CacheStore`] owns the data file and ledger and serializes access.
//! - [`CacheLayout`] maps URLs to cache paths and manages the cache directory.

mod action;
mod error;
mod info;
mod layout;
mod ledger;
mod store;

pub use action::{Action, ActionKind, DEFAULT_PACKAGE_SIZE, plan_actions};
pub use error::{CacheError, CacheResult};
pub use info::ResourceInfo;
pub use layout::CacheLayout;
pub use ledger::FragmentLedger;
pub use store::CacheStore;
