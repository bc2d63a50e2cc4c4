#![forbid(unsafe_code)]

use crate::{CacheEvent, PreloadEvent};

/// Every notification published on the [`EventBus`](crate::EventBus).
#[derive(Clone, Debug)]
pub enum Event {
    Cache(CacheEvent),
    Preload(PreloadEvent),
}

impl From<CacheEvent> for Event {
    fn from(e: CacheEvent) -> Self {
        Self::Cache(e)
    }
}

impl From<PreloadEvent> for Event {
    fn from(e: PreloadEvent) -> Self {
        Self::Preload(e)
    }
}

impl Event {
    /// URL of the resource the event concerns.
    pub fn url(&self) -> &url::Url {
        match self {
            Self::Cache(e) => e.url(),
            Self::Preload(e) => e.url(),
        }
    }
}

#[cfg(test)]
mod tests {
    use spool_cache::FragmentLedger;
    use url::Url;

    use super::*;

    #[test]
    fn sub_events_convert_and_expose_url() {
        let url = Url::parse("https://cdn.example.com/a.mp4").unwrap();

        let event: Event = CacheEvent::DownloadProgress {
            url: url.clone(),
            ledger: FragmentLedger::new(),
        }
        .into();
        assert!(matches!(event, Event::Cache(_)));
        assert_eq!(event.url(), &url);

        let event: Event = PreloadEvent::Finished {
            url: url.clone(),
            error: None,
        }
        .into();
        assert!(matches!(event, Event::Preload(_)));
        assert_eq!(event.url(), &url);
    }
}
