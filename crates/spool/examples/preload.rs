//! Example: warm the cache for a list of videos and report progress.
//!
//! Fetches the first megabyte of each URL into the cache directory, one at
//! a time, and prints the cache and preload events as they arrive.
//!
//! Run with:
//! ```
//! cargo run -p spool --example preload -- URL [URL...]
//! ```

use std::{env::args, error::Error};

use spool::prelude::*;
use tracing::{info, metadata::LevelFilter, warn};
use tracing_subscriber::EnvFilter;
use url::Url;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::default()
                .add_directive("spool=info".parse()?)
                .add_directive("spool_loader=info".parse()?)
                .add_directive("spool_net=warn".parse()?)
                .add_directive(LevelFilter::INFO.into()),
        )
        .with_line_number(false)
        .with_file(false)
        .init();

    let urls = args()
        .skip(1)
        .map(|arg| Url::parse(&arg))
        .collect::<Result<Vec<_>, _>>()?;
    if urls.is_empty() {
        warn!("no URLs given");
        return Ok(());
    }

    let spool = Spool::new(SpoolConfig::default());
    let mut events = spool.subscribe();
    let mut pending = urls.len();

    info!(count = pending, "Preloading...");
    spool.set_preload(urls);

    while pending > 0 {
        match events.recv().await? {
            Event::Preload(PreloadEvent::Finished { url, error }) => {
                pending -= 1;
                let ledger = spool.cached_ledger(&url)?;
                info!(
                    %url,
                    cached = ledger.downloaded_byte_count(),
                    ready = spool.is_enough_to_play(&url),
                    ?error,
                    "Preload finished"
                );
            }
            Event::Cache(CacheEvent::DownloadFinished { url, stats, .. }) => {
                info!(
                    %url,
                    bytes = stats.byte_count,
                    kib_per_sec = stats.speed_kib_per_sec(),
                    "Download finished"
                );
            }
            ev => info!(?ev),
        }
    }

    info!(total = spool.total_size()?, "Cache size");
    Ok(())
}
