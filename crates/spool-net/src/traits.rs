use std::{pin::Pin, time::Duration};

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use url::Url;

use crate::{
    error::NetError,
    head::ResponseHead,
    timeout::TimeoutNet,
    types::{Headers, RangeSpec},
};

pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, NetError>> + Send>>;

/// Response of a ranged GET: the head is available before the body is read.
pub struct RangeResponse {
    pub head: ResponseHead,
    pub body: ByteStream,
}

impl std::fmt::Debug for RangeResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RangeResponse")
            .field("head", &self.head)
            .finish_non_exhaustive()
    }
}

#[async_trait]
pub trait Net: Send + Sync {
    /// Issue a ranged GET and return once response headers have arrived.
    async fn get_range(
        &self,
        url: Url,
        range: RangeSpec,
        headers: Option<Headers>,
    ) -> Result<RangeResponse, NetError>;
}

#[async_trait]
impl<N: Net + ?Sized> Net for std::sync::Arc<N> {
    async fn get_range(
        &self,
        url: Url,
        range: RangeSpec,
        headers: Option<Headers>,
    ) -> Result<RangeResponse, NetError> {
        (**self).get_range(url, range, headers).await
    }
}

pub trait NetExt: Net + Sized {
    /// Add timeout layer
    fn with_timeout(self, timeout: Duration) -> TimeoutNet<Self> {
        TimeoutNet::new(self, timeout)
    }
}

impl<T: Net> NetExt for T {}
