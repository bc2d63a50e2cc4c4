#![forbid(unsafe_code)]

//! Player-facing URLs that route reads through the resource registry.

use url::Url;

use crate::{LoaderError, LoaderResult};

pub const LOADER_PREFIX: &str = "__loader__";

/// Wrap `url` so the playback engine hands its reads to the registry.
/// Local files are returned unchanged.
pub fn loader_url(url: &Url) -> String {
    if url.scheme() == "file" {
        return url.to_string();
    }
    format!("{LOADER_PREFIX}{url}")
}

pub fn is_loader_url(value: &str) -> bool {
    value.starts_with(LOADER_PREFIX)
}

/// Recover the real resource URL from a loader URL.
pub fn resolve_loader_url(value: &str) -> LoaderResult<Url> {
    let Some(real) = value.strip_prefix(LOADER_PREFIX) else {
        return Err(LoaderError::invalid_request(format!("not a loader url: {value}")));
    };
    Url::parse(real).map_err(|e| LoaderError::invalid_request(format!("bad url {real:?}: {e}")))
}
