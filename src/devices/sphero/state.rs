//! Sphero link diagnostics

use std::sync::atomic::{AtomicU64, Ordering};

/// Link counters using atomics for lock-free access
///
/// Written by the workers, read by anyone holding the driver.
#[derive(Debug, Default)]
pub struct LinkStats {
    /// Frames written in full by the transmitter
    pub frames_sent: AtomicU64,
    /// Valid frames assembled by the framer
    pub frames_received: AtomicU64,
    /// Candidate frames rejected by checksum
    pub checksum_errors: AtomicU64,
    /// Candidate frames with an implausible length
    pub malformed_frames: AtomicU64,
    /// Failed or short writes
    pub write_errors: AtomicU64,
    /// Transport read failures
    pub read_errors: AtomicU64,
    /// Sync requests that got no matching reply in time
    pub sync_timeouts: AtomicU64,
}

/// Point-in-time copy of [`LinkStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkStatsSnapshot {
    pub frames_sent: u64,
    pub frames_received: u64,
    pub checksum_errors: u64,
    pub malformed_frames: u64,
    pub write_errors: u64,
    pub read_errors: u64,
    pub sync_timeouts: u64,
}

impl LinkStats {
    #[inline]
    pub(super) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> LinkStatsSnapshot {
        LinkStatsSnapshot {
            frames_sent: self.frames_sent.load(Ordering::Relaxed),
            frames_received: self.frames_received.load(Ordering::Relaxed),
            checksum_errors: self.checksum_errors.load(Ordering::Relaxed),
            malformed_frames: self.malformed_frames.load(Ordering::Relaxed),
            write_errors: self.write_errors.load(Ordering::Relaxed),
            read_errors: self.read_errors.load(Ordering::Relaxed),
            sync_timeouts: self.sync_timeouts.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot() {
        let stats = LinkStats::default();
        LinkStats::bump(&stats.frames_sent);
        LinkStats::bump(&stats.frames_sent);
        LinkStats::bump(&stats.checksum_errors);

        let snap = stats.snapshot();
        assert_eq!(snap.frames_sent, 2);
        assert_eq!(snap.checksum_errors, 1);
        assert_eq!(snap.sync_timeouts, 0);
    }
}
