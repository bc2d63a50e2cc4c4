#![forbid(unsafe_code)]

//! Fragment ledger: which byte ranges of a cache file hold downloaded data.

use std::{fs, io::ErrorKind, ops::Range, path::Path};

use rangemap::RangeSet;
use serde::{Deserialize, Serialize};

use crate::{CacheResult, info::ResourceInfo};

/// Persisted download state of one resource.
///
/// Fragments are kept in a [`RangeSet`], which merges overlapping and
/// adjacent ranges: `[0,10)` + `[10,20)` is `[0,20)`, while `[0,10)` +
/// `[11,20)` stays two fragments.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FragmentLedger {
    pub info: Option<ResourceInfo>,
    fragments: RangeSet<u64>,
}

impl FragmentLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the downloaded fragments, ascending.
    pub fn fragments(&self) -> Vec<Range<u64>> {
        self.fragments.iter().cloned().collect()
    }

    pub fn ranges(&self) -> &RangeSet<u64> {
        &self.fragments
    }

    pub fn downloaded_byte_count(&self) -> u64 {
        self.fragments.iter().map(|f| f.end - f.start).sum()
    }

    /// Downloaded share of the resource, `-1.0` while the length is unknown.
    pub fn progress(&self) -> f64 {
        match &self.info {
            Some(info) if info.content_length > 0 => {
                self.downloaded_byte_count() as f64 / info.content_length as f64
            }
            _ => -1.0,
        }
    }

    /// Record `fragment` as downloaded. Empty fragments are ignored.
    pub fn add(&mut self, fragment: Range<u64>) {
        if !fragment.is_empty() {
            self.fragments.insert(fragment);
        }
    }

    /// Load the ledger stored at `path`. A missing or empty file is an
    /// empty ledger.
    pub fn load(path: &Path) -> CacheResult<Self> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Self::new()),
            Err(e) => return Err(e.into()),
        };
        if bytes.is_empty() {
            return Ok(Self::new());
        }
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Atomically replace the ledger file at `path` (temp file + rename).
    pub fn save(&self, path: &Path) -> CacheResult<()> {
        let bytes = serde_json::to_vec(self)?;
        let mut temp = path.as_os_str().to_owned();
        temp.push(".tmp");
        fs::write(&temp, &bytes)?;
        fs::rename(&temp, path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use tempfile::TempDir;

    use super::*;

    fn ledger_of(ranges: &[Range<u64>]) -> FragmentLedger {
        let mut ledger = FragmentLedger::new();
        for r in ranges {
            ledger.add(r.clone());
        }
        ledger
    }

    fn assert_well_formed(ledger: &FragmentLedger) {
        for pair in ledger.fragments().windows(2) {
            assert!(
                pair[0].end < pair[1].start,
                "fragments {:?} and {:?} touch or overlap",
                pair[0],
                pair[1]
            );
        }
        assert!(ledger.fragments().iter().all(|f| f.start < f.end));
    }

    #[rstest]
    #[case::adjacent(&[0..10, 10..20], &[0..20])]
    #[case::adjacent_reversed(&[10..20, 0..10], &[0..20])]
    #[case::overlap(&[5..15, 0..10], &[0..15])]
    #[case::disjoint(&[0..10, 20..30], &[0..10, 20..30])]
    #[case::disjoint_reversed(&[20..30, 0..10], &[0..10, 20..30])]
    #[case::one_byte_gap_after(&[0..10, 11..20], &[0..10, 11..20])]
    #[case::one_byte_gap_before(&[11..20, 0..10], &[0..10, 11..20])]
    #[case::contained(&[0..100, 10..20], &[0..100])]
    #[case::covering(&[10..20, 30..40, 0..50], &[0..50])]
    #[case::bridge_exact(&[0..5, 20..30, 5..20], &[0..30])]
    #[case::bridge_overlapping(&[0..10, 20..30, 5..25], &[0..30])]
    #[case::between_with_gaps(&[0..5, 20..30, 10..15], &[0..5, 10..15, 20..30])]
    #[case::after_all(&[0..5, 10..15, 40..50], &[0..5, 10..15, 40..50])]
    #[case::touch_last_end(&[0..5, 10..15, 15..16], &[0..5, 10..16])]
    fn add_merges_by_boundary_rule(#[case] adds: &[Range<u64>], #[case] expected: &[Range<u64>]) {
        let ledger = ledger_of(adds);
        assert_eq!(ledger.fragments(), expected);
        assert_well_formed(&ledger);
    }

    #[rstest]
    #[case::empty(5..5)]
    #[case::inverted(Range { start: 9, end: 3 })]
    fn add_rejects_empty_fragment(#[case] fragment: Range<u64>) {
        let mut ledger = ledger_of(&[0..10]);
        ledger.add(fragment);
        assert_eq!(ledger.fragments(), &[0..10]);
    }

    #[test]
    fn add_is_idempotent() {
        let once = ledger_of(&[0..10, 20..30, 25..40]);
        let twice = ledger_of(&[0..10, 0..10, 20..30, 20..30, 25..40, 25..40]);
        assert_eq!(once, twice);
    }

    #[test]
    fn downloaded_count_and_progress() {
        let mut ledger = ledger_of(&[0..100, 200..250]);
        assert_eq!(ledger.downloaded_byte_count(), 150);
        assert!(ledger.progress() < 0.0);

        ledger.info = Some(ResourceInfo::new(1000, "video/mp4", true));
        assert!((ledger.progress() - 0.15).abs() < f64::EPSILON);

        ledger.add(100..1000);
        assert_eq!(ledger.fragments(), &[0..1000]);
        assert!((ledger.progress() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("clip.mp4.cfg");

        let mut ledger = ledger_of(&[0..10, 20..30]);
        ledger.info = Some(ResourceInfo::new(64, "video/mp4", true));
        ledger.save(&path).unwrap();

        assert_eq!(FragmentLedger::load(&path).unwrap(), ledger);
        assert!(!dir.path().join("clip.mp4.cfg.tmp").exists());
    }

    #[test]
    fn load_missing_or_empty_is_empty_ledger() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing.cfg");
        assert_eq!(FragmentLedger::load(&path).unwrap(), FragmentLedger::new());

        fs::write(&path, b"").unwrap();
        assert_eq!(FragmentLedger::load(&path).unwrap(), FragmentLedger::new());
    }

    #[test]
    fn load_corrupt_is_serialization_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("corrupt.cfg");
        fs::write(&path, b"{not json").unwrap();

        let err = FragmentLedger::load(&path).unwrap_err();
        assert!(err.is_serialization());
    }
}
