#![forbid(unsafe_code)]

use std::{
    fs::{self, File, OpenOptions},
    io::{Read, Seek, SeekFrom, Write},
    ops::Range,
    path::{Path, PathBuf},
};

use bytes::Bytes;
use parking_lot::Mutex;
use tracing::{debug, trace};
use url::Url;

use crate::{
    CacheError, CacheResult,
    action::{Action, plan_actions},
    info::ResourceInfo,
    ledger::FragmentLedger,
};

struct StoreState {
    file: File,
    ledger: FragmentLedger,
}

/// Cache file plus fragment ledger for one remote resource.
///
/// Shared by reference between every downloader working on the same URL.
/// Each operation holds the store lock for its whole seek/read/write/ledger
/// sequence, so concurrent writers never interleave.
pub struct CacheStore {
    url: Url,
    data_path: PathBuf,
    ledger_path: PathBuf,
    package_size: u64,
    state: Mutex<StoreState>,
}

impl std::fmt::Debug for CacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheStore")
            .field("url", &self.url.as_str())
            .field("data_path", &self.data_path)
            .finish_non_exhaustive()
    }
}

impl CacheStore {
    /// Open the data file at `data_path` and its sidecar ledger, creating
    /// the directory, file, or ledger when missing.
    pub fn open(url: Url, data_path: PathBuf, package_size: u64) -> CacheResult<Self> {
        if let Some(parent) = data_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&data_path)?;

        let ledger_path = Self::ledger_path_for(&data_path);
        let ledger = FragmentLedger::load(&ledger_path)?;

        debug!(
            %url,
            path = %data_path.display(),
            fragments = ledger.ranges().iter().count(),
            downloaded = ledger.downloaded_byte_count(),
            "cache store opened"
        );

        Ok(Self {
            url,
            data_path,
            ledger_path,
            package_size,
            state: Mutex::new(StoreState { file, ledger }),
        })
    }

    /// Sidecar path: `<data-path>.cfg`.
    pub fn ledger_path_for(data_path: &Path) -> PathBuf {
        let mut path = data_path.as_os_str().to_owned();
        path.push(".cfg");
        PathBuf::from(path)
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn path(&self) -> &Path {
        &self.data_path
    }

    pub fn package_size(&self) -> u64 {
        self.package_size
    }

    pub fn info(&self) -> Option<ResourceInfo> {
        self.state.lock().ledger.info.clone()
    }

    /// Snapshot of the current ledger.
    pub fn ledger(&self) -> FragmentLedger {
        self.state.lock().ledger.clone()
    }

    pub fn downloaded_byte_count(&self) -> u64 {
        self.state.lock().ledger.downloaded_byte_count()
    }

    pub fn plan_actions(&self, range: Range<u64>) -> Vec<Action> {
        let state = self.state.lock();
        plan_actions(state.ledger.ranges(), range, self.package_size)
    }

    /// Write `data` at `offset` and record it in the ledger.
    pub fn write(&self, offset: u64, data: &[u8]) -> CacheResult<()> {
        if data.is_empty() {
            return Ok(());
        }
        let mut state = self.state.lock();
        state.file.seek(SeekFrom::Start(offset))?;
        state.file.write_all(data)?;
        state.ledger.add(offset..offset + data.len() as u64);
        trace!(offset, len = data.len(), "cache write");
        Ok(())
    }

    /// Read exactly `range.len()` bytes.
    pub fn read(&self, range: Range<u64>) -> CacheResult<Bytes> {
        if range.start > range.end {
            return Err(CacheError::InvalidRange {
                start: range.start,
                end: range.end,
            });
        }
        let len = usize::try_from(range.end - range.start).map_err(|_| CacheError::InvalidRange {
            start: range.start,
            end: range.end,
        })?;
        let mut buf = vec![0u8; len];

        let mut state = self.state.lock();
        state.file.seek(SeekFrom::Start(range.start))?;
        state.file.read_exact(&mut buf)?;
        drop(state);

        trace!(start = range.start, len, "cache read");
        Ok(Bytes::from(buf))
    }

    /// Record resource metadata and size the data file to its length.
    ///
    /// Returns `false` without touching anything when info is already set.
    pub fn set_info(&self, info: ResourceInfo) -> CacheResult<bool> {
        let mut state = self.state.lock();
        if state.ledger.info.is_some() {
            return Ok(false);
        }
        state.file.set_len(info.content_length)?;
        state.file.sync_all()?;
        debug!(
            url = %self.url,
            content_length = info.content_length,
            content_type = %info.content_type,
            "resource info recorded"
        );
        state.ledger.info = Some(info);
        Ok(true)
    }

    /// Flush data to stable storage, then persist the ledger.
    ///
    /// The order guarantees the ledger never claims bytes the data file
    /// does not durably hold.
    pub fn save(&self) -> CacheResult<()> {
        let state = self.state.lock();
        state.file.sync_data()?;
        state.ledger.save(&self.ledger_path)
    }
}
