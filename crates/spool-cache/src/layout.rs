#![forbid(unsafe_code)]

use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use sha2::{Digest, Sha256};
use tracing::{debug, warn};
use url::Url;

use crate::{CacheResult, action::DEFAULT_PACKAGE_SIZE, ledger::FragmentLedger, store::CacheStore};

/// Cache directory: maps resource URLs to data files and sidecars.
#[derive(Clone, Debug)]
pub struct CacheLayout {
    dir: PathBuf,
    package_size: u64,
}

impl CacheLayout {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            package_size: DEFAULT_PACKAGE_SIZE,
        }
    }

    #[must_use]
    pub fn with_package_size(mut self, package_size: u64) -> Self {
        self.package_size = package_size.max(1);
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn package_size(&self) -> u64 {
        self.package_size
    }

    /// `<dir>/<sha256-hex(url)>.<ext>`; the extension comes from the last
    /// path segment and is omitted when there is none.
    pub fn data_path(&self, url: &Url) -> PathBuf {
        let digest = Sha256::digest(url.as_str().as_bytes());
        let mut name = hex::encode(digest);
        if let Some(ext) = url_extension(url) {
            name.push('.');
            name.push_str(ext);
        }
        self.dir.join(name)
    }

    pub fn ledger_path(&self, url: &Url) -> PathBuf {
        CacheStore::ledger_path_for(&self.data_path(url))
    }

    /// Open (or create) the store for `url`.
    pub fn open_store(&self, url: &Url) -> CacheResult<CacheStore> {
        CacheStore::open(url.clone(), self.data_path(url), self.package_size)
    }

    /// Persisted ledger for `url`, without opening the data file.
    pub fn cached_ledger(&self, url: &Url) -> CacheResult<FragmentLedger> {
        FragmentLedger::load(&self.ledger_path(url))
    }

    /// Whether at least `threshold` bytes of `url` are cached.
    ///
    /// An unreadable sidecar counts as nothing cached.
    pub fn is_enough_to_play(&self, url: &Url, threshold: u64) -> bool {
        match self.cached_ledger(url) {
            Ok(ledger) => ledger.downloaded_byte_count() >= threshold,
            Err(e) => {
                warn!(%url, error = %e, "unreadable cache ledger");
                false
            }
        }
    }

    /// Sum of file lengths in the cache directory. A missing directory is
    /// an empty cache.
    pub fn total_size(&self) -> CacheResult<u64> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let mut total = 0;
        for entry in entries {
            let meta = entry?.metadata()?;
            if meta.is_file() {
                total += meta.len();
            }
        }
        Ok(total)
    }

    /// Delete the whole cache directory.
    pub fn clear_all(&self) -> CacheResult<()> {
        match fs::remove_dir_all(&self.dir) {
            Ok(()) => {
                debug!(dir = %self.dir.display(), "cache cleared");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

fn url_extension(url: &Url) -> Option<&str> {
    let segment = url.path_segments()?.next_back()?;
    let (stem, ext) = segment.rsplit_once('.')?;
    (!stem.is_empty() && !ext.is_empty()).then_some(ext)
}
