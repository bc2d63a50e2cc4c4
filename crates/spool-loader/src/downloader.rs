#![forbid(unsafe_code)]

//! Range downloader: executes planned actions for one cache store.

use std::{
    ops::Range,
    sync::Arc,
    time::{Instant, SystemTime},
};

use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use parking_lot::Mutex;
use spool_cache::{Action, ActionKind, CacheError, CacheStore, ResourceInfo};
use spool_events::{CacheEvent, TransferStats};
use spool_net::{NetError, RangeSpec, ResponseHead};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::{LoaderContext, LoaderError, LoaderResult};

/// Messages from a download session to its owner, in order.
#[derive(Debug)]
pub enum DownloadEvent {
    /// Resource metadata, sent at most once per session.
    Response(ResourceInfo),
    /// Next bytes of the requested window.
    Chunk { data: Bytes, local: bool },
    /// Last message of a session.
    Finished(LoaderResult<()>),
}

#[derive(Clone, Debug, Default)]
pub enum DownloaderState {
    #[default]
    Idle,
    Executing,
    Failed(LoaderError),
    Cancelled,
}

struct StateCell {
    generation: u64,
    state: DownloaderState,
}

struct Session {
    cancel: CancellationToken,
    suspend: watch::Sender<bool>,
}

/// Serves byte windows of one resource from its [`CacheStore`] and the
/// network.
///
/// Each `download*` call starts a new session and cancels the previous
/// one. Dropping the downloader cancels the running session.
pub struct RangeDownloader {
    store: Arc<CacheStore>,
    ctx: LoaderContext,
    state: Arc<Mutex<StateCell>>,
    session: Mutex<Option<Session>>,
}

impl RangeDownloader {
    pub fn new(store: Arc<CacheStore>, ctx: LoaderContext) -> Self {
        Self {
            store,
            ctx,
            state: Arc::new(Mutex::new(StateCell {
                generation: 0,
                state: DownloaderState::Idle,
            })),
            session: Mutex::new(None),
        }
    }

    pub fn store(&self) -> &Arc<CacheStore> {
        &self.store
    }

    pub fn info(&self) -> Option<ResourceInfo> {
        self.store.info()
    }

    pub fn state(&self) -> DownloaderState {
        self.state.lock().state.clone()
    }

    /// Serve `length` bytes starting at `from`, clamped to the content
    /// length when it is known.
    pub fn download(&self, from: u64, length: u64) -> mpsc::UnboundedReceiver<DownloadEvent> {
        let mut range = from..from.saturating_add(length);
        if let Some(info) = self.store.info() {
            range.end = range.end.min(info.content_length);
            range.start = range.start.min(range.end);
        }
        let actions = self.store.plan_actions(range);
        self.start(actions)
    }

    /// Serve everything from `from` to the end of the resource. With an
    /// unknown length this is a single open-ended fetch.
    pub fn download_to_end(&self, from: u64) -> mpsc::UnboundedReceiver<DownloadEvent> {
        let actions = match self.store.info() {
            Some(info) => self
                .store
                .plan_actions(from.min(info.content_length)..info.content_length),
            None => vec![Action::remote_to_end(from)],
        };
        self.start(actions)
    }

    pub fn cancel(&self) {
        if let Some(session) = self.session.lock().take() {
            session.cancel.cancel();
        }
    }

    /// Pause the in-flight remote body transfer. Returns `false` when
    /// there is no session or it is already suspended.
    pub fn suspend(&self) -> bool {
        self.session
            .lock()
            .as_ref()
            .is_some_and(|s| s.suspend.send_if_modified(|v| !std::mem::replace(v, true)))
    }

    pub fn resume(&self) -> bool {
        self.session
            .lock()
            .as_ref()
            .is_some_and(|s| s.suspend.send_if_modified(|v| std::mem::replace(v, false)))
    }

    fn start(&self, actions: Vec<Action>) -> mpsc::UnboundedReceiver<DownloadEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let (suspend_tx, suspend_rx) = watch::channel(false);

        let previous = self.session.lock().replace(Session {
            cancel: cancel.clone(),
            suspend: suspend_tx,
        });
        if let Some(previous) = previous {
            previous.cancel.cancel();
        }

        let generation = {
            let mut cell = self.state.lock();
            cell.generation += 1;
            cell.state = DownloaderState::Executing;
            cell.generation
        };

        debug!(
            url = %self.store.url(),
            actions = actions.len(),
            generation,
            "download session started"
        );

        let task = SessionTask {
            store: Arc::clone(&self.store),
            ctx: self.ctx.clone(),
            cancel,
            suspend: suspend_rx,
            tx,
            state: Arc::clone(&self.state),
            generation,
            announced: false,
        };
        tokio::spawn(task.run(actions));
        rx
    }
}

impl Drop for RangeDownloader {
    fn drop(&mut self) {
        if let Some(session) = self.session.get_mut().take() {
            session.cancel.cancel();
        }
    }
}

impl std::fmt::Debug for RangeDownloader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RangeDownloader")
            .field("url", &self.store.url().as_str())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// Progress of one remote action.
struct Transfer {
    offset: u64,
    end: u64,
    buffer: BytesMut,
    stats: TransferStats,
    clock: Instant,
    last_progress: Instant,
}

struct SessionTask {
    store: Arc<CacheStore>,
    ctx: LoaderContext,
    cancel: CancellationToken,
    suspend: watch::Receiver<bool>,
    tx: mpsc::UnboundedSender<DownloadEvent>,
    state: Arc<Mutex<StateCell>>,
    generation: u64,
    announced: bool,
}

impl SessionTask {
    async fn run(mut self, actions: Vec<Action>) {
        let result = self.execute(actions).await;

        let state = match &result {
            Ok(()) => DownloaderState::Idle,
            Err(LoaderError::Cancelled) => DownloaderState::Cancelled,
            Err(e) => DownloaderState::Failed(e.clone()),
        };
        {
            let mut cell = self.state.lock();
            if cell.generation == self.generation {
                cell.state = state;
            }
        }

        match &result {
            Ok(()) => debug!(url = %self.store.url(), "download session finished"),
            Err(LoaderError::Cancelled) => debug!(url = %self.store.url(), "download session cancelled"),
            Err(e) => warn!(url = %self.store.url(), error = %e, "download session failed"),
        }
        let _ = self.tx.send(DownloadEvent::Finished(result));
    }

    async fn execute(&mut self, actions: Vec<Action>) -> LoaderResult<()> {
        for action in actions {
            if self.cancel.is_cancelled() {
                return Err(LoaderError::Cancelled);
            }
            match action.kind {
                ActionKind::Local => self.serve_local(action.range)?,
                ActionKind::Remote => self.fetch_remote(action.range).await?,
            }
        }
        Ok(())
    }

    /// Forward an event unless the session was cancelled.
    fn emit(&self, event: DownloadEvent) {
        if !self.cancel.is_cancelled() {
            let _ = self.tx.send(event);
        }
    }

    fn serve_local(&mut self, range: Range<u64>) -> LoaderResult<()> {
        let data = self.store.read(range.clone())?;
        trace!(start = range.start, end = range.end, "local action");
        self.emit(DownloadEvent::Chunk { data, local: true });
        Ok(())
    }

    async fn fetch_remote(&mut self, range: Range<u64>) -> LoaderResult<()> {
        debug!(url = %self.store.url(), start = range.start, end = range.end, "remote action");

        let now = Instant::now();
        let mut transfer = Transfer {
            offset: range.start,
            end: range.end,
            buffer: BytesMut::with_capacity(self.ctx.options.buffer_size),
            stats: TransferStats::new(SystemTime::now()),
            clock: now,
            last_progress: now,
        };

        let result = match self.transfer(&range, &mut transfer).await {
            // Buffered bytes of a cancelled session are dropped.
            Err(LoaderError::Cancelled) => Err(LoaderError::Cancelled),
            other => {
                let flushed = self.flush(&mut transfer).await;
                other.and(flushed)
            }
        };

        transfer.stats.elapsed = transfer.clock.elapsed();
        let ledger = self.store.ledger();
        let url = self.store.url().clone();
        self.ctx.bus.publish(CacheEvent::DownloadProgress {
            url: url.clone(),
            ledger: ledger.clone(),
        });
        self.ctx.bus.publish(CacheEvent::DownloadFinished {
            url,
            ledger,
            stats: transfer.stats,
            error: result.as_ref().err().map(ToString::to_string),
        });
        debug!(
            bytes = transfer.stats.byte_count,
            kib_per_sec = transfer.stats.speed_kib_per_sec(),
            "remote action done"
        );

        result
    }

    async fn transfer(&mut self, range: &Range<u64>, transfer: &mut Transfer) -> LoaderResult<()> {
        let url = self.store.url().clone();
        let headers = self.ctx.options.headers_for(&url);
        let spec = RangeSpec::from_range(range);

        let response = tokio::select! {
            biased;
            () = self.cancel.cancelled() => return Err(LoaderError::Cancelled),
            response = self.ctx.net.get_range(url, spec, headers) => response?,
        };
        self.accept_head(&response.head, range.start)?;
        if let Some(info) = self.store.info() {
            transfer.end = transfer.end.min(info.content_length);
        }

        let mut body = response.body;
        loop {
            self.wait_resumed().await?;
            let next = tokio::select! {
                biased;
                () = self.cancel.cancelled() => return Err(LoaderError::Cancelled),
                next = body.next() => next,
            };
            let Some(chunk) = next else {
                break;
            };
            let mut chunk = chunk?;

            let received = transfer.offset + transfer.buffer.len() as u64;
            let remaining = transfer.end.saturating_sub(received);
            if chunk.len() as u64 > remaining {
                // `remaining` fits in usize here since it is below chunk.len().
                chunk.truncate(remaining as usize);
            }
            trace!(len = chunk.len(), "network chunk");
            transfer.buffer.extend_from_slice(&chunk);

            if transfer.buffer.len() >= self.ctx.options.buffer_size {
                self.flush(transfer).await?;
                self.maybe_progress(transfer);
            }
            if received + chunk.len() as u64 >= transfer.end {
                break;
            }
        }

        let received = transfer.offset + transfer.buffer.len() as u64;
        if transfer.end != u64::MAX && received < transfer.end {
            return Err(NetError::ShortBody {
                expected: transfer.end - range.start,
                received: received - range.start,
            }
            .into());
        }
        Ok(())
    }

    /// Validate response headers and record resource info.
    fn accept_head(&mut self, head: &ResponseHead, offset: u64) -> LoaderResult<()> {
        if !head.is_video() {
            let content_type = head.content_type().unwrap_or_default().to_string();
            return Err(NetError::UnsupportedContentType(content_type).into());
        }
        if offset > 0 && !head.is_partial() {
            return Err(NetError::RangeIgnored { offset }.into());
        }
        if head.is_partial() {
            let actual = head.content_range_start();
            if actual != Some(offset) {
                return Err(NetError::RangeMismatch {
                    expected: offset,
                    actual,
                }
                .into());
            }
        }
        if self.announced {
            return Ok(());
        }

        let info = match self.store.info() {
            Some(info) => info,
            None => {
                let Some(total) = head.total_length() else {
                    warn!(url = %self.store.url(), "response carries no resource length");
                    return Ok(());
                };
                let info = ResourceInfo::new(
                    total,
                    head.content_type().unwrap_or_default(),
                    head.accepts_byte_ranges(),
                );
                self.store.set_info(info)?;
                self.store.info().unwrap_or_else(|| {
                    ResourceInfo::new(total, head.content_type().unwrap_or_default(), false)
                })
            }
        };
        self.announced = true;
        self.emit(DownloadEvent::Response(info));
        Ok(())
    }

    async fn wait_resumed(&mut self) -> LoaderResult<()> {
        loop {
            let suspended = *self.suspend.borrow_and_update();
            if !suspended {
                return Ok(());
            }
            trace!("transfer suspended");
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => return Err(LoaderError::Cancelled),
                changed = self.suspend.changed() => {
                    if changed.is_err() {
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Write buffered bytes through the store, persist, and forward them.
    ///
    /// File writes and the fsync run on the blocking pool.
    async fn flush(&mut self, transfer: &mut Transfer) -> LoaderResult<()> {
        if transfer.buffer.is_empty() {
            return Ok(());
        }
        let data = transfer.buffer.split().freeze();
        let len = data.len() as u64;

        let store = Arc::clone(&self.store);
        let offset = transfer.offset;
        let written = data.clone();
        let saved = tokio::task::spawn_blocking(move || {
            store.write(offset, &written)?;
            Ok::<_, CacheError>(store.save())
        })
        .await
        .map_err(|e| LoaderError::Storage(Arc::new(CacheError::Io(std::io::Error::other(e)))))??;
        if let Err(e) = saved {
            self.ctx.sink.report(self.store.url(), &e.into());
        }
        transfer.offset += len;
        transfer.stats.byte_count += len;

        self.emit(DownloadEvent::Chunk { data, local: false });
        Ok(())
    }

    fn maybe_progress(&self, transfer: &mut Transfer) {
        if transfer.last_progress.elapsed() < self.ctx.options.progress_interval {
            return;
        }
        transfer.last_progress = Instant::now();
        let ledger = self.store.ledger();
        trace!(progress = ledger.progress(), "download progress");
        self.ctx.bus.publish(CacheEvent::DownloadProgress {
            url: self.store.url().clone(),
            ledger,
        });
    }
}
