use std::{sync::Arc, time::Duration};

use parking_lot::Mutex;
use rstest::rstest;
use spool_cache::CacheLayout;
use spool_loader::{
    ActiveResources, DataRequest, ErrorSink, LoaderContext, LoaderError, LoaderOptions,
    LoadingRequest, PreloadQueue, ResourceRegistry, testing::RecordingRequest,
};
use spool_net::{HttpClient, NetError, NetOptions};
use spool_test_utils::{MediaRoute, MediaServer, pattern_bytes};
use tempfile::TempDir;
use url::Url;

const WAIT: Duration = Duration::from_secs(5);

struct Harness {
    _dir: TempDir,
    layout: CacheLayout,
    registry: ResourceRegistry,
    sink_calls: Arc<Mutex<Vec<String>>>,
}

fn harness_with_layout(dir: TempDir, layout: CacheLayout) -> Harness {
    let sink_calls = Arc::new(Mutex::new(Vec::new()));
    let sink = {
        let calls = Arc::clone(&sink_calls);
        ErrorSink::new(move |url, e| calls.lock().push(format!("{url}: {e}")))
    };
    let ctx = LoaderContext::new(HttpClient::new(NetOptions::default()))
        .with_sink(sink)
        .with_options(LoaderOptions::default().with_buffer_size(4096));
    let registry = ResourceRegistry::new(layout.clone(), ctx, ActiveResources::new(), None);
    Harness {
        _dir: dir,
        layout,
        registry,
        sink_calls,
    }
}

fn harness() -> Harness {
    let dir = TempDir::new().unwrap();
    let layout = CacheLayout::new(dir.path().join("cache"));
    harness_with_layout(dir, layout)
}

fn window(offset: u64, length: u64) -> DataRequest {
    DataRequest {
        requested_offset: offset,
        requested_length: length,
        ..DataRequest::default()
    }
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + WAIT;
    while !condition() {
        assert!(tokio::time::Instant::now() < deadline, "condition not reached");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[rstest]
#[tokio::test]
#[timeout(Duration::from_secs(10))]
async fn serves_request_and_unregisters_when_done() {
    let data = pattern_bytes(40_000);
    let server = MediaServer::start(vec![MediaRoute::new("/a.mp4", data.clone())]).await;
    let h = harness();
    let url = server.url("/a.mp4");

    let request = Arc::new(RecordingRequest::new(window(0, 10_000)));
    h.registry.acquire(url.clone(), request.clone()).unwrap();
    assert!(h.registry.is_active(&url));

    assert!(matches!(request.wait_finished(WAIT).await, Some(Ok(()))));
    assert_eq!(request.received(), data[..10_000]);
    wait_until(|| !h.registry.is_active(&url)).await;
    assert_eq!(h.registry.active_count(), 0);

    let ledger = h.layout.cached_ledger(&url).unwrap();
    assert_eq!(ledger.fragments(), &[0..10_000]);
    assert!(h.sink_calls.lock().is_empty());
}

#[rstest]
#[tokio::test]
#[timeout(Duration::from_secs(10))]
async fn concurrent_windows_share_one_store() {
    let data = pattern_bytes(100_000);
    let server = MediaServer::start(vec![MediaRoute::new("/a.mp4", data.clone())]).await;
    let h = harness();
    let url = server.url("/a.mp4");

    let head = Arc::new(RecordingRequest::new(window(0, 20_000)));
    let tail = Arc::new(RecordingRequest::new(window(60_000, 20_000)));
    h.registry.acquire(url.clone(), head.clone()).unwrap();
    h.registry.acquire(url.clone(), tail.clone()).unwrap();
    assert_eq!(h.registry.active_count(), 1);

    assert!(matches!(head.wait_finished(WAIT).await, Some(Ok(()))));
    assert!(matches!(tail.wait_finished(WAIT).await, Some(Ok(()))));
    assert_eq!(head.received(), data[..20_000]);
    assert_eq!(tail.received(), data[60_000..80_000]);

    wait_until(|| h.registry.active_count() == 0).await;
    let ledger = h.layout.cached_ledger(&url).unwrap();
    assert_eq!(ledger.fragments(), &[0..20_000, 60_000..80_000]);
}

#[rstest]
#[tokio::test]
#[timeout(Duration::from_secs(10))]
async fn cached_bytes_are_not_fetched_again() {
    let data = pattern_bytes(20_000);
    let server = MediaServer::start(vec![MediaRoute::new("/a.mp4", data.clone())]).await;
    let h = harness();
    let url = server.url("/a.mp4");

    let first = Arc::new(RecordingRequest::new(window(0, 5_000)));
    h.registry.acquire(url.clone(), first.clone()).unwrap();
    first.wait_finished(WAIT).await.unwrap().unwrap();
    wait_until(|| !h.registry.is_active(&url)).await;

    let second = Arc::new(RecordingRequest::new(window(1_000, 8_000)));
    h.registry.acquire(url.clone(), second.clone()).unwrap();
    second.wait_finished(WAIT).await.unwrap().unwrap();

    assert_eq!(second.received(), data[1_000..9_000]);
    assert_eq!(
        server.log().ranges("/a.mp4"),
        vec!["bytes=0-4999", "bytes=5000-8999"]
    );
    // Second request knew the content info before any network response.
    assert_eq!(second.content_info().unwrap().content_length, 20_000);
}

#[rstest]
#[tokio::test]
#[timeout(Duration::from_secs(10))]
async fn release_cancels_without_reporting() {
    let route = MediaRoute::new("/a.mp4", pattern_bytes(200_000))
        .with_chunk_size(1024)
        .stall_after(4096);
    let server = MediaServer::start(vec![route]).await;
    let h = harness();
    let url = server.url("/a.mp4");

    let request = Arc::new(RecordingRequest::new(window(0, 200_000)));
    let id = h.registry.acquire(url.clone(), request.clone()).unwrap();
    wait_until(|| request.response_count() > 0).await;

    h.registry.release(&url, id);
    let responses = request.response_count();

    assert!(matches!(
        request.wait_finished(WAIT).await,
        Some(Err(LoaderError::Cancelled))
    ));
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(request.response_count(), responses);
    assert_eq!(request.finish_calls(), 1);
    assert!(!h.registry.is_active(&url));
    assert!(h.sink_calls.lock().is_empty());
}

#[rstest]
#[tokio::test]
#[timeout(Duration::from_secs(10))]
async fn failure_tears_down_entry_and_reports_once() {
    let route = MediaRoute::new("/a.mp4", pattern_bytes(10_000)).with_content_type("text/plain");
    let server = MediaServer::start(vec![route]).await;
    let h = harness();
    let url = server.url("/a.mp4");

    let request = Arc::new(RecordingRequest::new(window(0, 1_000)));
    h.registry.acquire(url.clone(), request.clone()).unwrap();

    let result = request.wait_finished(WAIT).await.unwrap();
    assert!(matches!(
        result,
        Err(LoaderError::Network(NetError::UnsupportedContentType(_)))
    ));
    wait_until(|| h.sink_calls.lock().len() == 1).await;
    assert!(!h.registry.is_active(&url));
}

#[rstest]
#[tokio::test]
#[timeout(Duration::from_secs(10))]
async fn unopenable_store_finishes_request_and_registers_nothing() {
    let dir = TempDir::new().unwrap();
    let blocker = dir.path().join("not-a-dir");
    std::fs::write(&blocker, b"file").unwrap();
    let layout = CacheLayout::new(blocker.join("cache"));
    let h = harness_with_layout(dir, layout);
    let url = Url::parse("http://127.0.0.1:9/a.mp4").unwrap();

    let request = Arc::new(RecordingRequest::new(window(0, 100)));
    let err = h.registry.acquire(url.clone(), request.clone()).unwrap_err();

    assert!(matches!(err, LoaderError::Storage(_)));
    assert!(matches!(request.result(), Some(Err(LoaderError::Storage(_)))));
    assert!(!h.registry.is_active(&url));
    assert_eq!(h.sink_calls.lock().len(), 1);
}

#[rstest]
#[tokio::test]
#[timeout(Duration::from_secs(10))]
async fn request_without_window_is_invalid() {
    let h = harness();
    let url = Url::parse("http://127.0.0.1:9/a.mp4").unwrap();
    let request: Arc<dyn LoadingRequest> = Arc::new(RecordingRequest::without_data_request());

    let err = h.registry.acquire(url.clone(), Arc::clone(&request)).unwrap_err();

    assert!(matches!(err, LoaderError::InvalidRequest(_)));
    assert!(request.is_finished());
    assert!(!h.registry.is_active(&url));
}

#[rstest]
#[tokio::test]
#[timeout(Duration::from_secs(10))]
async fn acquire_cancels_preload_of_same_url() {
    let route = MediaRoute::new("/a.mp4", pattern_bytes(50_000)).stall_after(0);
    let server = MediaServer::start(vec![route]).await;
    let dir = TempDir::new().unwrap();
    let layout = CacheLayout::new(dir.path().join("cache"));
    let active = ActiveResources::new();
    let ctx = LoaderContext::new(HttpClient::new(NetOptions::default()));
    let preload = PreloadQueue::new(layout.clone(), ctx.clone(), active.clone());
    let registry = ResourceRegistry::new(layout, ctx, active, Some(preload.clone()));
    let url = server.url("/a.mp4");

    preload.set_waiting([url.clone()]);
    preload.start();
    assert_eq!(preload.current(), Some(url.clone()));

    let request = Arc::new(RecordingRequest::new(window(0, 100)));
    registry.acquire(url.clone(), request).unwrap();

    assert_eq!(preload.current(), None);
    assert!(registry.is_active(&url));
}
