#![forbid(unsafe_code)]

use bytes::Bytes;
use spool_cache::ResourceInfo;

use crate::LoaderError;

/// Byte window a player asks for.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DataRequest {
    pub requested_offset: u64,
    pub requested_length: u64,
    /// Offset up to which data has already been delivered; `0` until the
    /// first response.
    pub current_offset: u64,
    pub requests_to_end: bool,
}

/// Resource metadata handed to the player.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContentInfo {
    pub content_type: String,
    pub content_length: u64,
    pub byte_range_access_supported: bool,
}

impl From<&ResourceInfo> for ContentInfo {
    fn from(info: &ResourceInfo) -> Self {
        Self {
            content_type: info.content_type.clone(),
            content_length: info.content_length,
            byte_range_access_supported: info.supports_range_access,
        }
    }
}

/// A read request issued by the playback engine.
///
/// Implementations are shared across tasks and use interior mutability.
pub trait LoadingRequest: Send + Sync {
    fn data_request(&self) -> Option<DataRequest>;

    /// Whether the request carries a content-information part.
    fn wants_content_info(&self) -> bool;

    fn fulfill_content_info(&self, info: &ContentInfo);

    /// Deliver the next bytes of the window, in order.
    fn respond(&self, data: Bytes);

    fn finish(&self, result: Result<(), LoaderError>);

    fn is_finished(&self) -> bool;
}
