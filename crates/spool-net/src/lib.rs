#![forbid(unsafe_code)]

//! `spool-net`
//!
//! Ranged HTTP access for the spool cache engine. The [`Net`] trait is the
//! seam the downloader talks to; [`HttpClient`] is the `reqwest` backed
//! implementation and [`TimeoutNet`] layers the per-request deadline on top.

mod client;
mod error;
mod head;
mod timeout;
mod traits;
mod types;

pub use crate::{
    client::HttpClient,
    error::{NetError, NetResult},
    head::ResponseHead,
    timeout::TimeoutNet,
    traits::{ByteStream, Net, NetExt, RangeResponse},
    types::{Headers, NetOptions, RangeSpec},
};
