//! Wall-clock timestamp type.
//!
//! Timestamps are milliseconds since the Unix epoch (UTC). They are used
//! exclusively for deadline comparisons — vote ordering is Lamport-only.
//! Deadline checks go through the synchronized clock, which adds the last
//! Berkeley-broadcast delta to the raw reading.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds since the Unix epoch (UTC).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(u64);

impl Timestamp {
    /// The epoch (time zero).
    pub const EPOCH: Self = Self(0);

    pub fn new(millis: u64) -> Self {
        Self(millis)
    }

    /// Current raw system time. Callers that care about cluster-agreed time
    /// must go through the synchronized clock instead.
    pub fn now() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;
        Self(millis)
    }

    pub fn as_millis(&self) -> u64 {
        self.0
    }

    /// Shift by a signed correction delta, saturating at zero.
    pub fn offset_by(&self, delta_ms: i64) -> Self {
        Self(self.0.saturating_add_signed(delta_ms))
    }

    /// Whether this timestamp falls strictly after `deadline`.
    pub fn is_after(&self, deadline: Timestamp) -> bool {
        self.0 > deadline.0
    }

    /// Milliseconds elapsed since this timestamp (relative to `now`).
    pub fn elapsed_since(&self, now: Timestamp) -> u64 {
        now.0.saturating_sub(self.0)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.0)
    }
}
