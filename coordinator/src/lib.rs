//! The vote coordinator — the orchestrating component of the ballot engine.
//!
//! Validates eligibility, stamps and orders incoming votes, resolves
//! duplicate-submission conflicts, drives quorum replication, and owns the
//! session lifecycle. The admission queue bounds how many votes are in
//! flight; the synchronized clock enforces the deadline against the voter's
//! click time rather than the processing time.

pub mod config;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod roster;
pub mod session;
pub mod sync;
pub mod tally;

pub use config::CoordinatorConfig;
pub use coordinator::{run_health_checks, Coordinator, StatusSnapshot};
pub use error::CoordinatorError;
pub use events::{CoordinatorEvent, EventFeed, EventSink, TracingSink};
pub use roster::Roster;
pub use session::VotingSession;
pub use sync::run_clock_sync;
pub use tally::{compute, TallyOutcome, TallyResult};
