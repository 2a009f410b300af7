//! Synchronized wall clock — raw system time plus the last Berkeley delta.

use ballot_types::Timestamp;
use std::sync::atomic::{AtomicI64, Ordering};

/// Wall-clock reads corrected by the last broadcast Berkeley delta.
///
/// Used only for deadline comparisons. The correction is cumulative: each
/// sync round broadcasts a delta relative to the node's *current* corrected
/// reading, so deltas add up.
#[derive(Debug, Default)]
pub struct SyncedClock {
    correction_ms: AtomicI64,
}

impl SyncedClock {
    pub fn new() -> Self {
        Self {
            correction_ms: AtomicI64::new(0),
        }
    }

    /// Current corrected wall-clock time.
    pub fn now(&self) -> Timestamp {
        self.correct(Timestamp::now())
    }

    /// Apply the correction to an arbitrary raw reading.
    pub fn correct(&self, raw: Timestamp) -> Timestamp {
        raw.offset_by(self.correction_ms.load(Ordering::SeqCst))
    }

    /// Fold in a corrective delta broadcast by a sync round.
    pub fn adjust(&self, delta_ms: i64) {
        self.correction_ms.fetch_add(delta_ms, Ordering::SeqCst);
    }

    /// Accumulated correction in milliseconds.
    pub fn correction_ms(&self) -> i64 {
        self.correction_ms.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corrections_accumulate() {
        let clock = SyncedClock::new();
        clock.adjust(300);
        clock.adjust(-100);
        assert_eq!(clock.correction_ms(), 200);
        assert_eq!(clock.correct(Timestamp::new(1_000)), Timestamp::new(1_200));
    }

    #[test]
    fn negative_correction_shifts_backwards() {
        let clock = SyncedClock::new();
        clock.adjust(-500);
        assert_eq!(clock.correct(Timestamp::new(2_000)), Timestamp::new(1_500));
    }

    #[test]
    fn uncorrected_clock_is_identity() {
        let clock = SyncedClock::new();
        assert_eq!(clock.correct(Timestamp::new(42)), Timestamp::new(42));
    }
}
