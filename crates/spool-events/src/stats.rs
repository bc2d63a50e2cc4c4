#![forbid(unsafe_code)]

use std::time::{Duration, SystemTime};

/// Throughput of one remote transfer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TransferStats {
    pub byte_count: u64,
    pub elapsed: Duration,
    pub started_at: SystemTime,
}

impl TransferStats {
    pub fn new(started_at: SystemTime) -> Self {
        Self {
            byte_count: 0,
            elapsed: Duration::ZERO,
            started_at,
        }
    }

    /// KiB per second, `0.0` before any time has elapsed.
    pub fn speed_kib_per_sec(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs <= 0.0 {
            return 0.0;
        }
        self.byte_count as f64 / 1024.0 / secs
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(0, Duration::ZERO, 0.0)]
    #[case(1024, Duration::ZERO, 0.0)]
    #[case(1024, Duration::from_secs(1), 1.0)]
    #[case(512 * 1024, Duration::from_millis(250), 2048.0)]
    fn speed(#[case] bytes: u64, #[case] elapsed: Duration, #[case] expected: f64) {
        let stats = TransferStats {
            byte_count: bytes,
            elapsed,
            started_at: SystemTime::UNIX_EPOCH,
        };
        assert!((stats.speed_kib_per_sec() - expected).abs() < 1e-9);
    }
}
