//! Lamport stamp — the logical ordering domain for votes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A value drawn from the process-wide Lamport counter.
///
/// Stamps are strictly increasing within a process; across processes the
/// total order over concurrent vote submissions is the `(stamp, voter_id)`
/// tuple, lower tuple first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LamportStamp(u64);

impl LamportStamp {
    pub const ZERO: Self = Self(0);

    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }

    /// The stamp that the max-fold rule produces on observing `remote`:
    /// `max(local, remote) + 1`.
    pub fn folded_with(&self, remote: LamportStamp) -> Self {
        Self(self.0.max(remote.0) + 1)
    }
}

impl fmt::Display for LamportStamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folded_with_takes_max_plus_one() {
        let local = LamportStamp::new(7);
        assert_eq!(local.folded_with(LamportStamp::new(3)), LamportStamp::new(8));
        assert_eq!(local.folded_with(LamportStamp::new(12)), LamportStamp::new(13));
        assert_eq!(local.folded_with(local), LamportStamp::new(8));
    }

    #[test]
    fn ordering_is_numeric() {
        assert!(LamportStamp::new(1) < LamportStamp::new(2));
        assert!(LamportStamp::ZERO < LamportStamp::new(1));
    }
}
