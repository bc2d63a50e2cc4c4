#![forbid(unsafe_code)]

//! Background warm-up of the head of queued resources.

use std::{collections::VecDeque, sync::Arc, time::Duration};

use parking_lot::Mutex;
use spool_cache::CacheLayout;
use spool_events::PreloadEvent;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use url::Url;

use crate::{ActiveResources, DownloadEvent, LoaderContext, LoaderResult, RangeDownloader};

/// Foreground playback buffer, used to decide whether preloading may run.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BufferHealth {
    /// Share of the current item that is buffered, `0.0..=1.0`.
    pub progress: f64,
    /// Buffered media ahead of the playhead.
    pub buffered_ahead: Duration,
}

impl BufferHealth {
    pub fn new(progress: f64, buffered_ahead: Duration) -> Self {
        Self {
            progress,
            buffered_ahead,
        }
    }

    /// Fully buffered, or more than three seconds ahead.
    pub fn is_healthy(&self) -> bool {
        self.progress >= 0.99 || self.buffered_ahead > Duration::from_secs(3)
    }
}

struct Current {
    url: Url,
    downloader: Arc<RangeDownloader>,
    generation: u64,
}

#[derive(Default)]
struct QueueState {
    waiting: VecDeque<Url>,
    current: Option<Current>,
    generation: u64,
}

struct PreloadInner {
    layout: CacheLayout,
    ctx: LoaderContext,
    active: ActiveResources,
    state: Mutex<QueueState>,
}

/// Ordered list of URLs whose first bytes are fetched ahead of playback,
/// one at a time.
#[derive(Clone)]
pub struct PreloadQueue {
    inner: Arc<PreloadInner>,
}

impl PreloadQueue {
    pub fn new(layout: CacheLayout, ctx: LoaderContext, active: ActiveResources) -> Self {
        Self {
            inner: Arc::new(PreloadInner {
                layout,
                ctx,
                active,
                state: Mutex::new(QueueState::default()),
            }),
        }
    }

    pub fn budget(&self) -> u64 {
        self.inner.ctx.options.preload_budget
    }

    /// Replace the waiting list and abandon the current warm-up.
    pub fn set_waiting<I: IntoIterator<Item = Url>>(&self, urls: I) {
        let mut state = self.inner.state.lock();
        state.waiting = urls.into_iter().collect();
        if let Some(current) = state.current.take() {
            debug!(url = %current.url, "preload abandoned");
        }
    }

    pub fn waiting(&self) -> Vec<Url> {
        self.inner.state.lock().waiting.iter().cloned().collect()
    }

    /// URL of the warm-up in flight.
    pub fn current(&self) -> Option<Url> {
        self.inner.state.lock().current.as_ref().map(|c| c.url.clone())
    }

    /// Resume the current warm-up, or begin the next one.
    ///
    /// Must be called within a Tokio runtime.
    pub fn start(&self) {
        let (url, events, generation, cached) = {
            let mut state = self.inner.state.lock();
            if let Some(current) = &state.current {
                current.downloader.resume();
                return;
            }
            let Some(url) = state.waiting.pop_front() else {
                return;
            };
            if self.inner.active.contains(&url) {
                debug!(%url, "preload skipped, resource is playing");
                return;
            }

            let store = match self.inner.layout.open_store(&url) {
                Ok(store) => Arc::new(store),
                Err(e) => {
                    drop(state);
                    self.inner.ctx.sink.report(&url, &e.into());
                    return;
                }
            };
            let cached = store.downloaded_byte_count();
            let downloader = Arc::new(RangeDownloader::new(store, self.inner.ctx.clone()));
            let events = downloader.download(0, self.budget());

            state.generation += 1;
            let generation = state.generation;
            state.current = Some(Current {
                url: url.clone(),
                downloader,
                generation,
            });
            (url, events, generation, cached)
        };

        debug!(%url, cached, budget = self.budget(), "preload started");
        if cached < self.budget() {
            self.inner.ctx.bus.publish(PreloadEvent::Started { url: url.clone() });
        }

        let queue = self.clone();
        tokio::spawn(async move {
            let result = wait_finished(events).await;
            queue.finished(generation, url, result);
        });
    }

    /// Suspend the warm-up in flight, keeping queue position.
    pub fn pause(&self) {
        let state = self.inner.state.lock();
        let Some(current) = &state.current else {
            return;
        };
        if current.downloader.suspend() {
            debug!(url = %current.url, "preload paused");
            self.inner
                .ctx
                .bus
                .publish(PreloadEvent::Paused { url: current.url.clone() });
        }
    }

    /// Drop `url` from the queue, abandoning it if it is in flight.
    pub fn remove(&self, url: &Url) {
        let mut state = self.inner.state.lock();
        state.waiting.retain(|u| u != url);
        if state.current.as_ref().is_some_and(|c| &c.url == url) {
            state.current = None;
            debug!(%url, "preload removed");
        }
    }

    /// Run while foreground playback is comfortably buffered, pause
    /// otherwise.
    pub fn update_buffer(&self, health: BufferHealth) {
        if health.is_healthy() {
            self.start();
        } else {
            self.pause();
        }
    }

    fn finished(&self, generation: u64, url: Url, result: LoaderResult<()>) {
        {
            let mut state = self.inner.state.lock();
            if state.current.as_ref().map(|c| c.generation) != Some(generation) {
                return;
            }
            state.current = None;
        }

        match &result {
            Ok(()) => debug!(%url, "preload finished"),
            Err(e) => warn!(%url, error = %e, "preload failed"),
        }
        self.start();
        self.inner.ctx.bus.publish(PreloadEvent::Finished {
            url,
            error: result.err().map(|e| e.to_string()),
        });
    }
}

impl std::fmt::Debug for PreloadQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreloadQueue")
            .field("current", &self.current())
            .field("waiting", &self.waiting().len())
            .finish()
    }
}

async fn wait_finished(mut events: mpsc::UnboundedReceiver<DownloadEvent>) -> LoaderResult<()> {
    while let Some(event) = events.recv().await {
        if let DownloadEvent::Finished(result) = event {
            return result;
        }
    }
    Err(crate::LoaderError::Cancelled)
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(0.99, 0, true)]
    #[case(1.0, 0, true)]
    #[case(0.5, 4, true)]
    #[case(0.5, 3, false)]
    #[case(0.0, 0, false)]
    fn buffer_health(#[case] progress: f64, #[case] ahead_secs: u64, #[case] healthy: bool) {
        let health = BufferHealth::new(progress, Duration::from_secs(ahead_secs));
        assert_eq!(health.is_healthy(), healthy);
    }
}
