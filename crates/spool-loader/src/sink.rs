#![forbid(unsafe_code)]

use std::{fmt, sync::Arc};

use url::Url;

use crate::LoaderError;

type SinkFn = dyn Fn(&Url, &LoaderError) + Send + Sync;

/// Best-effort receiver of load failures.
///
/// Cancellations are filtered out before the callback runs. The default
/// sink logs through `tracing`.
#[derive(Clone)]
pub struct ErrorSink {
    callback: Arc<SinkFn>,
}

impl ErrorSink {
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(&Url, &LoaderError) + Send + Sync + 'static,
    {
        Self {
            callback: Arc::new(callback),
        }
    }

    pub fn report(&self, url: &Url, error: &LoaderError) {
        if error.is_cancelled() {
            return;
        }
        (self.callback)(url, error);
    }
}

impl Default for ErrorSink {
    fn default() -> Self {
        Self::new(|url, error| tracing::error!(%url, %error, "load failed"))
    }
}

impl fmt::Debug for ErrorSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorSink").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;
    use spool_net::NetError;

    use super::*;

    #[test]
    fn cancellations_never_reach_callback() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = {
            let seen = Arc::clone(&seen);
            ErrorSink::new(move |_, e| seen.lock().push(e.to_string()))
        };
        let url = Url::parse("https://cdn.example.com/a.mp4").unwrap();

        sink.report(&url, &LoaderError::Cancelled);
        sink.report(&url, &LoaderError::Network(NetError::Timeout));

        assert_eq!(seen.lock().as_slice(), ["network error: Timeout"]);
    }
}
