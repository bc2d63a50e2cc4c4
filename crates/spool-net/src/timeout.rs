use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use url::Url;

use crate::{
    ByteStream,
    error::NetError,
    traits::{Net, RangeResponse},
    types::{Headers, RangeSpec},
};

/// Timeout decorator for Net implementations.
///
/// The deadline applies to the request/response phase and, separately, to
/// each wait for the next body chunk.
pub struct TimeoutNet<N> {
    inner: N,
    timeout: Duration,
}

impl<N: Net> TimeoutNet<N> {
    pub fn new(inner: N, timeout: Duration) -> Self {
        Self { inner, timeout }
    }
}

fn idle_timeout(body: ByteStream, timeout: Duration) -> ByteStream {
    let stream = futures::stream::unfold(Some(body), move |state| async move {
        let mut body = state?;
        match tokio::time::timeout(timeout, body.next()).await {
            Ok(Some(item)) => Some((item, Some(body))),
            Ok(None) => None,
            // Yield the timeout once, then end the stream.
            Err(_) => Some((Err(NetError::timeout()), None)),
        }
    });
    Box::pin(stream)
}

#[async_trait]
impl<N: Net> Net for TimeoutNet<N> {
    async fn get_range(
        &self,
        url: Url,
        range: RangeSpec,
        headers: Option<Headers>,
    ) -> Result<RangeResponse, NetError> {
        let response = tokio::time::timeout(self.timeout, self.inner.get_range(url, range, headers))
            .await
            .map_err(|_| NetError::timeout())??;

        Ok(RangeResponse {
            head: response.head,
            body: idle_timeout(response.body, self.timeout),
        })
    }
}
