#![forbid(unsafe_code)]

//! Resource registry: one shared cache store per URL, one bridge per
//! player request.

use std::{
    collections::{HashMap, hash_map::Entry},
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use parking_lot::Mutex;
use spool_cache::{CacheLayout, CacheStore};
use tracing::{debug, warn};
use url::Url;

use crate::{
    BridgeExit, LoaderContext, LoaderError, LoaderResult, LoadingRequest, PreloadQueue,
    RangeDownloader, RequestBridge,
};

pub type BridgeId = u64;

struct ResourceEntry {
    store: Arc<CacheStore>,
    default_downloader: Arc<RangeDownloader>,
    bridges: Vec<(BridgeId, Arc<RequestBridge>)>,
}

/// URLs with a live registry entry.
///
/// Shared between the registry, which owns the entries, and the preload
/// queue, which skips URLs that are already being played.
#[derive(Clone, Default)]
pub struct ActiveResources {
    entries: Arc<Mutex<HashMap<Url, ResourceEntry>>>,
}

impl ActiveResources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, url: &Url) -> bool {
        self.entries.lock().contains_key(url)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl std::fmt::Debug for ActiveResources {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActiveResources")
            .field("len", &self.len())
            .finish()
    }
}

struct RegistryInner {
    layout: CacheLayout,
    ctx: LoaderContext,
    active: ActiveResources,
    preload: Option<PreloadQueue>,
    next_id: AtomicU64,
}

/// Routes player requests for a URL onto a shared [`CacheStore`].
///
/// The first request of a resource uses its default downloader; requests
/// arriving while others are still active get their own downloader over
/// the same store.
#[derive(Clone)]
pub struct ResourceRegistry {
    inner: Arc<RegistryInner>,
}

impl ResourceRegistry {
    /// `preload`, when given, has queued warm-ups of a URL cancelled before
    /// player requests for it are served.
    pub fn new(
        layout: CacheLayout,
        ctx: LoaderContext,
        active: ActiveResources,
        preload: Option<PreloadQueue>,
    ) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                layout,
                ctx,
                active,
                preload,
                next_id: AtomicU64::new(1),
            }),
        }
    }

    pub fn active(&self) -> &ActiveResources {
        &self.inner.active
    }

    pub fn is_active(&self, url: &Url) -> bool {
        self.inner.active.contains(url)
    }

    pub fn active_count(&self) -> usize {
        self.inner.active.len()
    }

    /// Serve `request` for `url`.
    ///
    /// Must be called within a Tokio runtime. On error the request has
    /// already been finished with that error.
    pub fn acquire(&self, url: Url, request: Arc<dyn LoadingRequest>) -> LoaderResult<BridgeId> {
        if let Some(preload) = &self.inner.preload {
            preload.remove(&url);
        }

        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let opened = {
            let mut entries = self.inner.active.entries.lock();
            let entry = match entries.entry(url.clone()) {
                Entry::Occupied(occupied) => Ok(occupied.into_mut()),
                Entry::Vacant(vacant) => match self.inner.layout.open_store(&url) {
                    Ok(store) => {
                        let store = Arc::new(store);
                        let default_downloader = Arc::new(RangeDownloader::new(
                            Arc::clone(&store),
                            self.inner.ctx.clone(),
                        ));
                        debug!(%url, "resource registered");
                        Ok(vacant.insert(ResourceEntry {
                            store,
                            default_downloader,
                            bridges: Vec::new(),
                        }))
                    }
                    Err(e) => Err(LoaderError::from(e)),
                },
            };

            entry.map(|entry| {
                let downloader = if entry.bridges.is_empty() {
                    Arc::clone(&entry.default_downloader)
                } else {
                    Arc::new(RangeDownloader::new(
                        Arc::clone(&entry.store),
                        self.inner.ctx.clone(),
                    ))
                };
                let bridge = Arc::new(RequestBridge::new(Arc::clone(&request), downloader));
                entry.bridges.push((id, Arc::clone(&bridge)));
                bridge
            })
        };

        let bridge = match opened {
            Ok(bridge) => bridge,
            Err(e) => {
                self.inner.ctx.sink.report(&url, &e);
                request.finish(Err(e.clone()));
                return Err(e);
            }
        };

        let events = match bridge.start() {
            Ok(events) => events,
            Err(e) => {
                self.detach(&url, id);
                self.inner.ctx.sink.report(&url, &e);
                request.finish(Err(e.clone()));
                return Err(e);
            }
        };

        debug!(%url, id, "bridge started");
        let registry = self.clone();
        tokio::spawn(async move {
            let exit = bridge.pump(events).await;
            registry.bridge_exited(&url, id, exit);
        });
        Ok(id)
    }

    /// Drop a request: cancel its downloader and finish it as cancelled if
    /// it is still in flight.
    pub fn release(&self, url: &Url, id: BridgeId) {
        if let Some(bridge) = self.detach(url, id) {
            debug!(%url, id, "bridge released");
            bridge.cancel();
        }
    }

    /// Release every request of every resource.
    pub fn cancel_all(&self) {
        let entries: Vec<_> = self.inner.active.entries.lock().drain().collect();
        for (url, entry) in entries {
            debug!(%url, bridges = entry.bridges.len(), "resource cancelled");
            for (_, bridge) in entry.bridges {
                bridge.cancel();
            }
        }
    }

    /// Remove bridge `id`, and the entry with its last bridge.
    fn detach(&self, url: &Url, id: BridgeId) -> Option<Arc<RequestBridge>> {
        let mut entries = self.inner.active.entries.lock();
        let entry = entries.get_mut(url)?;
        let index = entry.bridges.iter().position(|(bid, _)| *bid == id)?;
        let (_, bridge) = entry.bridges.remove(index);
        if entry.bridges.is_empty() {
            entries.remove(url);
            debug!(%url, "resource unregistered");
        }
        Some(bridge)
    }

    fn bridge_exited(&self, url: &Url, id: BridgeId, exit: BridgeExit) {
        match exit {
            BridgeExit::Completed | BridgeExit::Cancelled => {
                self.detach(url, id);
            }
            BridgeExit::Failed(error) => {
                let Some(entry) = self.inner.active.entries.lock().remove(url) else {
                    return;
                };
                warn!(%url, %error, bridges = entry.bridges.len(), "resource torn down");
                for (other, bridge) in entry.bridges {
                    if other == id {
                        continue;
                    }
                    bridge.downloader().cancel();
                    if !bridge.request().is_finished() {
                        bridge.request().finish(Err(error.clone()));
                    }
                }
                self.inner.ctx.sink.report(url, &error);
            }
        }
    }
}

impl std::fmt::Debug for ResourceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceRegistry")
            .field("active", &self.inner.active)
            .finish_non_exhaustive()
    }
}
