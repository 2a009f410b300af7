//! Process-wide Lamport counter.

use ballot_types::LamportStamp;
use std::sync::atomic::{AtomicU64, Ordering};

/// The process-wide Lamport clock.
///
/// Every local event ticks the counter; every stamp received from a remote
/// process is folded in with `max(local, remote) + 1`. Both operations are
/// single atomic updates, so concurrent callers can never observe or return
/// the same value twice.
#[derive(Debug, Default)]
pub struct LamportClock {
    counter: AtomicU64,
}

impl LamportClock {
    pub fn new() -> Self {
        Self {
            counter: AtomicU64::new(0),
        }
    }

    /// Resume from a previously observed stamp (e.g. a snapshot).
    pub fn starting_at(stamp: LamportStamp) -> Self {
        Self {
            counter: AtomicU64::new(stamp.value()),
        }
    }

    /// Advance the counter and return the new value.
    ///
    /// Strictly greater than every value previously returned or observed.
    pub fn tick(&self) -> LamportStamp {
        LamportStamp::new(self.counter.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Fold a remote stamp into the local counter: `max(local, remote) + 1`.
    pub fn observe(&self, remote: LamportStamp) -> LamportStamp {
        let updated = self
            .counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
                Some(current.max(remote.value()) + 1)
            })
            // The closure always returns Some, so fetch_update cannot fail.
            .unwrap_or_else(|prev| prev);
        LamportStamp::new(updated.max(remote.value()) + 1)
    }

    /// The last value handed out, without advancing.
    pub fn current(&self) -> LamportStamp {
        LamportStamp::new(self.counter.load(Ordering::SeqCst))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn tick_is_strictly_increasing() {
        let clock = LamportClock::new();
        let a = clock.tick();
        let b = clock.tick();
        let c = clock.tick();
        assert!(a < b && b < c);
        assert_eq!(clock.current(), c);
    }

    #[test]
    fn observe_folds_remote_stamp() {
        let clock = LamportClock::new();
        clock.tick(); // local = 1
        let stamp = clock.observe(LamportStamp::new(10));
        assert_eq!(stamp, LamportStamp::new(11));
        assert!(clock.tick() > stamp);
    }

    #[test]
    fn observe_of_stale_stamp_still_advances() {
        let clock = LamportClock::starting_at(LamportStamp::new(50));
        let stamp = clock.observe(LamportStamp::new(3));
        assert_eq!(stamp, LamportStamp::new(51));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn tick_never_duplicates_under_concurrency() {
        let clock = Arc::new(LamportClock::new());
        let mut handles = Vec::new();

        for _ in 0..50 {
            let c = Arc::clone(&clock);
            handles.push(tokio::spawn(async move {
                let mut stamps = Vec::with_capacity(100);
                for _ in 0..100 {
                    stamps.push(c.tick());
                }
                stamps
            }));
        }

        let mut seen = HashSet::new();
        for h in handles {
            for stamp in h.await.unwrap() {
                assert!(seen.insert(stamp), "duplicate stamp {stamp}");
            }
        }
        assert_eq!(seen.len(), 50 * 100);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn mixed_tick_and_observe_never_duplicates() {
        let clock = Arc::new(LamportClock::new());
        let mut handles = Vec::new();

        for i in 0..50u64 {
            let c = Arc::clone(&clock);
            handles.push(tokio::spawn(async move {
                let mut stamps = Vec::with_capacity(40);
                for j in 0..20 {
                    stamps.push(c.tick());
                    stamps.push(c.observe(LamportStamp::new(i * 20 + j)));
                }
                stamps
            }));
        }

        let mut seen = HashSet::new();
        for h in handles {
            for stamp in h.await.unwrap() {
                assert!(seen.insert(stamp), "duplicate stamp {stamp}");
            }
        }
    }
}
