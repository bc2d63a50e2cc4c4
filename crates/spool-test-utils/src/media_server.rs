//! Range-aware media server for downloader tests.

use std::{convert::Infallible, sync::Arc};

use axum::{
    Router,
    body::Body,
    http::{HeaderMap, StatusCode, header},
    response::Response,
    routing::get,
};
use bytes::Bytes;
use futures::StreamExt;
use parking_lot::Mutex;
use tokio::{net::TcpListener, sync::oneshot};
use url::Url;

/// One file served by [`MediaServer`].
#[derive(Clone, Debug)]
pub struct MediaRoute {
    pub path: String,
    pub data: Bytes,
    pub content_type: String,
    /// Body is sent in pieces of this size.
    pub chunk_size: usize,
    /// Send this many body bytes, then never finish the response.
    pub stall_after: Option<usize>,
    /// Answer every request with the full body and `200`.
    pub ignore_range: bool,
}

impl MediaRoute {
    pub fn new(path: &str, data: Bytes) -> Self {
        Self {
            path: path.to_string(),
            data,
            content_type: "video/mp4".to_string(),
            chunk_size: 16 * 1024,
            stall_after: None,
            ignore_range: false,
        }
    }

    #[must_use]
    pub fn with_content_type(mut self, content_type: &str) -> Self {
        self.content_type = content_type.to_string();
        self
    }

    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    #[must_use]
    pub fn stall_after(mut self, bytes: usize) -> Self {
        self.stall_after = Some(bytes);
        self
    }

    #[must_use]
    pub fn ignoring_range(mut self) -> Self {
        self.ignore_range = true;
        self
    }
}

/// Requests seen by a [`MediaServer`]: `(path, Range header or "-")`.
#[derive(Clone, Debug, Default)]
pub struct ServerLog {
    entries: Arc<Mutex<Vec<(String, String)>>>,
}

impl ServerLog {
    fn push(&self, path: &str, range: &str) {
        self.entries.lock().push((path.to_string(), range.to_string()));
    }

    /// Range header values received for `path`, in arrival order.
    #[must_use]
    pub fn ranges(&self, path: &str) -> Vec<String> {
        self.entries
            .lock()
            .iter()
            .filter(|(p, _)| p == path)
            .map(|(_, r)| r.clone())
            .collect()
    }

    #[must_use]
    pub fn request_count(&self) -> usize {
        self.entries.lock().len()
    }
}

/// HTTP server answering `Range` requests for a fixed set of files.
///
/// Listens on a random localhost port and shuts down when dropped.
pub struct MediaServer {
    base_url: Url,
    log: ServerLog,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl MediaServer {
    /// # Panics
    ///
    /// Panics if the listener cannot bind.
    pub async fn start(routes: Vec<MediaRoute>) -> Self {
        let log = ServerLog::default();
        let mut router = Router::new();
        for route in routes {
            let route = Arc::new(route);
            let path = route.path.clone();
            let log = log.clone();
            router = router.route(
                &path,
                get(move |headers: HeaderMap| {
                    let route = Arc::clone(&route);
                    let log = log.clone();
                    async move { serve(&route, &headers, &log) }
                }),
            );
        }

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind media server");
        let addr = listener.local_addr().expect("media server address");
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .expect("serve media routes");
        });

        Self {
            base_url: Url::parse(&format!("http://{addr}/")).expect("media server URL"),
            log,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    /// # Panics
    ///
    /// Panics if `path` does not join onto the server URL.
    #[must_use]
    pub fn url(&self, path: &str) -> Url {
        self.base_url.join(path).expect("join media path")
    }

    #[must_use]
    pub fn log(&self) -> &ServerLog {
        &self.log
    }
}

impl Drop for MediaServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

fn parse_range(value: &str, len: u64) -> Option<(u64, u64)> {
    let spec = value.strip_prefix("bytes=")?;
    let (start, end) = spec.split_once('-')?;
    let start: u64 = start.trim().parse().ok()?;
    let last = len.checked_sub(1)?;
    let end = if end.trim().is_empty() {
        last
    } else {
        end.trim().parse::<u64>().ok()?.min(last)
    };
    (start <= end).then_some((start, end))
}

fn body_for(route: &MediaRoute, data: Bytes) -> Body {
    let send_len = route.stall_after.map_or(data.len(), |n| n.min(data.len()));
    let chunks: Vec<Result<Bytes, Infallible>> = (0..send_len)
        .step_by(route.chunk_size)
        .map(|at| Ok(data.slice(at..(at + route.chunk_size).min(send_len))))
        .collect();
    let head = futures::stream::iter(chunks);

    if route.stall_after.is_some() {
        Body::from_stream(head.chain(futures::stream::pending()))
    } else {
        Body::from_stream(head)
    }
}

fn serve(route: &MediaRoute, headers: &HeaderMap, log: &ServerLog) -> Response {
    let total = route.data.len() as u64;
    let range_header = headers
        .get(header::RANGE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    log.push(&route.path, range_header.as_deref().unwrap_or("-"));

    let builder = Response::builder()
        .header(header::CONTENT_TYPE, route.content_type.as_str())
        .header(header::ACCEPT_RANGES, "bytes");

    let Some(range_value) = range_header.filter(|_| !route.ignore_range) else {
        return builder
            .status(StatusCode::OK)
            .header(header::CONTENT_LENGTH, total)
            .body(body_for(route, route.data.clone()))
            .unwrap();
    };

    let Some((start, end)) = parse_range(&range_value, total) else {
        return Response::builder()
            .status(StatusCode::RANGE_NOT_SATISFIABLE)
            .header(header::CONTENT_RANGE, format!("bytes */{total}"))
            .body(Body::empty())
            .unwrap();
    };

    let slice = route
        .data
        .slice(usize::try_from(start).unwrap()..=usize::try_from(end).unwrap());
    builder
        .status(StatusCode::PARTIAL_CONTENT)
        .header(header::CONTENT_RANGE, format!("bytes {start}-{end}/{total}"))
        .header(header::CONTENT_LENGTH, slice.len())
        .body(body_for(route, slice))
        .unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_range_variants() {
        assert_eq!(parse_range("bytes=0-99", 1000), Some((0, 99)));
        assert_eq!(parse_range("bytes=900-", 1000), Some((900, 999)));
        assert_eq!(parse_range("bytes=900-5000", 1000), Some((900, 999)));
        assert_eq!(parse_range("bytes=1000-", 1000), None);
        assert_eq!(parse_range("items=0-1", 1000), None);
    }
}
