#![forbid(unsafe_code)]

use std::sync::Arc;

use spool_cache::{CacheLayout, CacheResult, FragmentLedger};
use spool_events::{Event, EventBus};
use spool_loader::{
    ActiveResources, BridgeId, BufferHealth, LoaderContext, LoadingRequest,
    PreloadQueue, ResourceRegistry, loader_url, resolve_loader_url,
};
use spool_net::{HttpClient, NetExt};
use tokio::sync::broadcast;
use tracing::{debug, warn};
use url::Url;

use crate::SpoolConfig;

/// The cache service: one registry, preload queue, event bus and error
/// sink over one cache directory.
///
/// Cheap to clone; clones share everything.
#[derive(Clone, Debug)]
pub struct Spool {
    layout: CacheLayout,
    registry: ResourceRegistry,
    preload: PreloadQueue,
    bus: EventBus,
    enough_to_play: u64,
}

impl Spool {
    pub fn new(config: SpoolConfig) -> Self {
        let layout = CacheLayout::new(config.cache_dir).with_package_size(config.package_size);
        let bus = EventBus::new(config.events_channel_capacity);
        let net = HttpClient::new(config.net.clone()).with_timeout(config.net.request_timeout);
        let ctx = LoaderContext::new(net)
            .with_bus(bus.clone())
            .with_sink(config.error_sink)
            .with_options(config.loader);

        let active = ActiveResources::new();
        let preload = PreloadQueue::new(layout.clone(), ctx.clone(), active.clone());
        let registry = ResourceRegistry::new(layout.clone(), ctx, active, Some(preload.clone()));

        debug!(dir = %layout.dir().display(), "spool ready");
        Self {
            layout,
            registry,
            preload,
            bus,
            enough_to_play: config.enough_to_play,
        }
    }

    /// URL to give the playback engine for `url`.
    pub fn player_url(&self, url: &Url) -> String {
        loader_url(url)
    }

    /// Take over a read request the playback engine issued for a player URL.
    ///
    /// Returns `None` when the request cannot be served; it has then been
    /// finished with the error. Must be called within a Tokio runtime.
    pub fn handle_request(
        &self,
        player_url: &str,
        request: Arc<dyn LoadingRequest>,
    ) -> Option<BridgeId> {
        let url = match resolve_loader_url(player_url) {
            Ok(url) => url,
            Err(e) => {
                warn!(player_url, error = %e, "unsupported loading request");
                request.finish(Err(e));
                return None;
            }
        };
        self.registry.acquire(url, request).ok()
    }

    /// The playback engine dropped a request it handed over earlier.
    pub fn cancel_request(&self, player_url: &str, id: BridgeId) {
        if let Ok(url) = resolve_loader_url(player_url) {
            self.registry.release(&url, id);
        }
    }

    pub fn registry(&self) -> &ResourceRegistry {
        &self.registry
    }

    pub fn preload(&self) -> &PreloadQueue {
        &self.preload
    }

    /// Replace the preload list and start warming it.
    pub fn set_preload<I: IntoIterator<Item = Url>>(&self, urls: I) {
        self.preload.set_waiting(urls);
        self.preload.start();
    }

    pub fn update_buffer(&self, health: BufferHealth) {
        self.preload.update_buffer(health);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.bus.subscribe()
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Bytes used by the cache directory.
    pub fn total_size(&self) -> CacheResult<u64> {
        self.layout.total_size()
    }

    /// Stop all loads and delete every cached file.
    pub fn clear_all(&self) -> CacheResult<()> {
        self.registry.cancel_all();
        self.preload.set_waiting(Vec::new());
        self.layout.clear_all()
    }

    /// Persisted ledger of `url`; empty when nothing is cached.
    pub fn cached_ledger(&self, url: &Url) -> CacheResult<FragmentLedger> {
        self.layout.cached_ledger(url)
    }

    /// Whether enough of `url` is cached for playback to start without a
    /// stall. Local files always are.
    pub fn is_enough_to_play(&self, url: &Url) -> bool {
        url.scheme() == "file" || self.layout.is_enough_to_play(url, self.enough_to_play)
    }
}
