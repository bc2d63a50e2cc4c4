#![forbid(unsafe_code)]

use std::sync::Arc;

use spool_events::EventBus;
use spool_net::Net;

use crate::{ErrorSink, LoaderOptions};

/// Collaborators shared by every downloader of one loader stack.
#[derive(Clone)]
pub struct LoaderContext {
    pub net: Arc<dyn Net>,
    pub bus: EventBus,
    pub sink: ErrorSink,
    pub options: LoaderOptions,
}

impl LoaderContext {
    pub fn new<N: Net + 'static>(net: N) -> Self {
        Self {
            net: Arc::new(net),
            bus: EventBus::default(),
            sink: ErrorSink::default(),
            options: LoaderOptions::default(),
        }
    }

    #[must_use]
    pub fn with_bus(mut self, bus: EventBus) -> Self {
        self.bus = bus;
        self
    }

    #[must_use]
    pub fn with_sink(mut self, sink: ErrorSink) -> Self {
        self.sink = sink;
        self
    }

    #[must_use]
    pub fn with_options(mut self, options: LoaderOptions) -> Self {
        self.options = options;
        self
    }
}

impl std::fmt::Debug for LoaderContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoaderContext")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}
