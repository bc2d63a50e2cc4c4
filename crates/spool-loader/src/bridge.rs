#![forbid(unsafe_code)]

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use spool_cache::ResourceInfo;
use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::{
    ContentInfo, DownloadEvent, LoaderError, LoaderResult, LoadingRequest, RangeDownloader,
};

/// How a bridge stopped.
#[derive(Clone, Debug)]
pub enum BridgeExit {
    /// The request was finished successfully.
    Completed,
    /// The downloader was cancelled or the request ended elsewhere.
    Cancelled,
    /// The request was finished with this error.
    Failed(LoaderError),
}

/// Adapts one [`LoadingRequest`] onto a [`RangeDownloader`].
pub struct RequestBridge {
    request: Arc<dyn LoadingRequest>,
    downloader: Arc<RangeDownloader>,
    info_delivered: AtomicBool,
}

impl RequestBridge {
    /// Fulfills content info right away when the store already knows it.
    pub fn new(request: Arc<dyn LoadingRequest>, downloader: Arc<RangeDownloader>) -> Self {
        let bridge = Self {
            request,
            downloader,
            info_delivered: AtomicBool::new(false),
        };
        if let Some(info) = bridge.downloader.info() {
            bridge.deliver_info(&info);
        }
        bridge
    }

    pub fn request(&self) -> &Arc<dyn LoadingRequest> {
        &self.request
    }

    pub fn downloader(&self) -> &Arc<RangeDownloader> {
        &self.downloader
    }

    fn deliver_info(&self, info: &ResourceInfo) {
        if !self.request.wants_content_info() || self.info_delivered.swap(true, Ordering::AcqRel) {
            return;
        }
        self.request.fulfill_content_info(&ContentInfo::from(info));
    }

    /// Start the downloader on the request's window.
    ///
    /// Resumes from `current_offset` when data was already delivered.
    pub fn start(&self) -> LoaderResult<mpsc::UnboundedReceiver<DownloadEvent>> {
        let Some(window) = self.request.data_request() else {
            return Err(LoaderError::invalid_request("loading request has no data request"));
        };

        let from = if window.current_offset != 0 {
            window.current_offset
        } else {
            window.requested_offset
        };
        debug!(
            from,
            requested_offset = window.requested_offset,
            requested_length = window.requested_length,
            to_end = window.requests_to_end,
            "bridge start"
        );

        if window.requests_to_end {
            Ok(self.downloader.download_to_end(from))
        } else {
            let consumed = from.saturating_sub(window.requested_offset);
            let length = window.requested_length.saturating_sub(consumed);
            Ok(self.downloader.download(from, length))
        }
    }

    /// Forward downloader events to the request until the session ends.
    ///
    /// A cancelled session leaves the request untouched.
    pub async fn pump(&self, mut events: mpsc::UnboundedReceiver<DownloadEvent>) -> BridgeExit {
        while let Some(event) = events.recv().await {
            match event {
                DownloadEvent::Response(info) => self.deliver_info(&info),
                DownloadEvent::Chunk { data, .. } => {
                    if self.request.is_finished() {
                        trace!("request finished elsewhere, stopping downloader");
                        self.downloader.cancel();
                        return BridgeExit::Cancelled;
                    }
                    self.request.respond(data);
                }
                DownloadEvent::Finished(Ok(())) => {
                    self.request.finish(Ok(()));
                    return BridgeExit::Completed;
                }
                DownloadEvent::Finished(Err(LoaderError::Cancelled)) => {
                    return BridgeExit::Cancelled;
                }
                DownloadEvent::Finished(Err(e)) => {
                    self.request.finish(Err(e.clone()));
                    return BridgeExit::Failed(e);
                }
            }
        }
        BridgeExit::Cancelled
    }

    /// Stop the downloader and finish the request as cancelled if it is
    /// still in flight.
    pub fn cancel(&self) {
        self.downloader.cancel();
        if !self.request.is_finished() {
            self.request.finish(Err(LoaderError::Cancelled));
        }
    }
}

impl std::fmt::Debug for RequestBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestBridge")
            .field("downloader", &self.downloader)
            .finish_non_exhaustive()
    }
}
