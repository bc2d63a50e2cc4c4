#![forbid(unsafe_code)]

//! Splitting a requested byte range into local and remote work.

use std::ops::Range;

use rangemap::RangeSet;

/// Largest single disk read a local action performs.
pub const DEFAULT_PACKAGE_SIZE: u64 = 512 * 1024;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActionKind {
    /// Serve from the cache file.
    Local,
    /// Fetch over the network.
    Remote,
}

/// One step of serving a requested range.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Action {
    pub kind: ActionKind,
    pub range: Range<u64>,
}

impl Action {
    pub fn local(range: Range<u64>) -> Self {
        Self {
            kind: ActionKind::Local,
            range,
        }
    }

    pub fn remote(range: Range<u64>) -> Self {
        Self {
            kind: ActionKind::Remote,
            range,
        }
    }

    /// Open-ended remote fetch from `start` to the end of the resource.
    pub fn remote_to_end(start: u64) -> Self {
        Self::remote(start..u64::MAX)
    }

    pub fn is_local(&self) -> bool {
        self.kind == ActionKind::Local
    }

    pub fn len(&self) -> u64 {
        self.range.end.saturating_sub(self.range.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Plan how to serve `range` given the downloaded `fragments`.
///
/// The returned actions are ordered, contiguous and cover `range` exactly.
/// Cached bytes become local actions of at most `package_size` bytes; every
/// gap becomes one remote action.
pub fn plan_actions(fragments: &RangeSet<u64>, range: Range<u64>, package_size: u64) -> Vec<Action> {
    if range.start >= range.end {
        return Vec::new();
    }
    let package_size = package_size.max(1);

    let mut locals = Vec::new();
    for fragment in fragments.overlapping(&range) {
        let start = fragment.start.max(range.start);
        let end = fragment.end.min(range.end);

        let packages = (end - start).div_ceil(package_size);
        for i in 0..packages {
            let offset = start + i * package_size;
            locals.push(Action::local(offset..(offset + package_size).min(end)));
        }
    }

    if locals.is_empty() {
        return vec![Action::remote(range)];
    }

    let mut actions = Vec::with_capacity(locals.len() * 2 + 1);
    let mut cursor = range.start;
    for local in locals {
        if cursor < local.range.start {
            actions.push(Action::remote(cursor..local.range.start));
        }
        cursor = local.range.end;
        actions.push(local);
    }
    if cursor < range.end {
        actions.push(Action::remote(cursor..range.end));
    }

    tracing::trace!(
        start = range.start,
        end = range.end,
        actions = actions.len(),
        "planned cache actions"
    );
    actions
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    const KIB: u64 = 1024;

    fn set(ranges: &[Range<u64>]) -> RangeSet<u64> {
        ranges.iter().cloned().collect()
    }

    fn assert_covers(actions: &[Action], range: &Range<u64>) {
        let mut cursor = range.start;
        for action in actions {
            assert_eq!(action.range.start, cursor, "gap or overlap at {cursor}");
            assert!(!action.is_empty());
            cursor = action.range.end;
        }
        assert_eq!(cursor, range.end);
    }

    #[test]
    fn empty_cache_is_single_remote() {
        let actions = plan_actions(&set(&[]), 0..1000, DEFAULT_PACKAGE_SIZE);
        assert_eq!(actions, vec![Action::remote(0..1000)]);
    }

    #[test]
    fn partial_head_splits_local_then_remote() {
        let actions = plan_actions(&set(&[0..500]), 200..800, DEFAULT_PACKAGE_SIZE);
        assert_eq!(actions, vec![Action::local(200..500), Action::remote(500..800)]);
    }

    #[test]
    fn fully_cached_range_is_chunked_by_package_size() {
        let actions = plan_actions(&set(&[0..2_000_000]), 0..2_000_000, 512 * KIB);

        assert_eq!(actions.len(), 4);
        assert!(actions.iter().all(Action::is_local));
        assert!(actions.iter().all(|a| a.len() <= 512 * KIB));
        assert_eq!(actions.iter().map(Action::len).sum::<u64>(), 2_000_000);
        assert_eq!(actions[3].range, 3 * 512 * KIB..2_000_000);
    }

    #[rstest]
    #[case::gap_in_middle(&[0..100, 200..300], 0..300, &[
        Action::local(0..100), Action::remote(100..200), Action::local(200..300),
    ])]
    #[case::gaps_on_both_sides(&[100..200], 50..250, &[
        Action::remote(50..100), Action::local(100..200), Action::remote(200..250),
    ])]
    #[case::fragments_outside(&[0..10, 500..600], 100..200, &[Action::remote(100..200)])]
    #[case::request_inside_fragment(&[0..1000], 10..20, &[Action::local(10..20)])]
    fn interleaves_remote_gaps(
        #[case] fragments: &[Range<u64>],
        #[case] range: Range<u64>,
        #[case] expected: &[Action],
    ) {
        let actions = plan_actions(&set(fragments), range.clone(), DEFAULT_PACKAGE_SIZE);
        assert_eq!(actions, expected);
        assert_covers(&actions, &range);
    }

    #[test]
    fn empty_request_plans_nothing() {
        assert!(plan_actions(&set(&[0..10]), 5..5, DEFAULT_PACKAGE_SIZE).is_empty());
    }

    #[rstest]
    #[case(1)]
    #[case(7)]
    #[case(64)]
    fn cached_offsets_are_local_and_gaps_remote(#[case] package_size: u64) {
        let fragments = [3..40, 41..90, 150..151, 200..260];
        let range = 0..300;
        let actions = plan_actions(&set(&fragments), range.clone(), package_size);

        assert_covers(&actions, &range);
        for action in &actions {
            if action.is_local() {
                assert!(action.len() <= package_size);
            }
            for offset in action.range.clone() {
                let cached = fragments.iter().any(|f| f.contains(&offset));
                assert_eq!(action.is_local(), cached, "offset {offset} in {action:?}");
            }
        }
    }
}
