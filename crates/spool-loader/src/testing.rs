//! In-memory [`LoadingRequest`] for tests.

use std::time::Duration;

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::{ContentInfo, DataRequest, LoaderError, LoadingRequest};

#[derive(Default)]
struct Recorded {
    received: Vec<u8>,
    responses: usize,
    content_info: Option<ContentInfo>,
    content_info_calls: usize,
    result: Option<Result<(), LoaderError>>,
    finish_calls: usize,
}

/// Records everything a loader does to a request.
pub struct RecordingRequest {
    window: Option<DataRequest>,
    wants_info: bool,
    recorded: Mutex<Recorded>,
    finished: Notify,
}

impl RecordingRequest {
    pub fn new(window: DataRequest) -> Self {
        Self {
            window: Some(window),
            wants_info: true,
            recorded: Mutex::new(Recorded::default()),
            finished: Notify::new(),
        }
    }

    pub fn without_data_request() -> Self {
        Self {
            window: None,
            ..Self::new(DataRequest::default())
        }
    }

    #[must_use]
    pub fn without_content_info(mut self) -> Self {
        self.wants_info = false;
        self
    }

    pub fn received(&self) -> Vec<u8> {
        self.recorded.lock().received.clone()
    }

    pub fn response_count(&self) -> usize {
        self.recorded.lock().responses
    }

    pub fn content_info(&self) -> Option<ContentInfo> {
        self.recorded.lock().content_info.clone()
    }

    pub fn content_info_calls(&self) -> usize {
        self.recorded.lock().content_info_calls
    }

    pub fn result(&self) -> Option<Result<(), LoaderError>> {
        self.recorded.lock().result.clone()
    }

    pub fn finish_calls(&self) -> usize {
        self.recorded.lock().finish_calls
    }

    /// Finish the request from the player side.
    pub fn finish_externally(&self) {
        self.finish(Ok(()));
    }

    /// Wait until the request is finished, or `limit` elapses.
    pub async fn wait_finished(&self, limit: Duration) -> Option<Result<(), LoaderError>> {
        let waiting = self.finished.notified();
        if let Some(result) = self.result() {
            return Some(result);
        }
        let _ = tokio::time::timeout(limit, waiting).await;
        self.result()
    }
}

impl LoadingRequest for RecordingRequest {
    fn data_request(&self) -> Option<DataRequest> {
        self.window
    }

    fn wants_content_info(&self) -> bool {
        self.wants_info
    }

    fn fulfill_content_info(&self, info: &ContentInfo) {
        let mut recorded = self.recorded.lock();
        recorded.content_info = Some(info.clone());
        recorded.content_info_calls += 1;
    }

    fn respond(&self, data: Bytes) {
        let mut recorded = self.recorded.lock();
        recorded.received.extend_from_slice(&data);
        recorded.responses += 1;
    }

    fn finish(&self, result: Result<(), LoaderError>) {
        {
            let mut recorded = self.recorded.lock();
            recorded.finish_calls += 1;
            if recorded.result.is_none() {
                recorded.result = Some(result);
            }
        }
        self.finished.notify_waiters();
    }

    fn is_finished(&self) -> bool {
        self.recorded.lock().result.is_some()
    }
}
