//! Clock service for the ballot engine.
//!
//! Two independent time domains live here:
//! - [`LamportClock`] — the logical counter that totally orders votes.
//! - [`SyncedClock`] + [`BerkeleySync`] — wall-clock agreement for deadline
//!   enforcement only. Deadline time is never used for ordering.

pub mod berkeley;
pub mod lamport;
pub mod synced;

pub use berkeley::{BerkeleySync, RoundPlan};
pub use lamport::LamportClock;
pub use synced::SyncedClock;
