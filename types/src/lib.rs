//! Fundamental types for the ballot coordination engine.
//!
//! This crate defines the core types shared across every other crate in the
//! workspace: voter and candidate identifiers, Lamport stamps, wall-clock
//! timestamps, session state, and the vote request/outcome pair that crosses
//! the coordinator boundary.

pub mod candidate;
pub mod lamport;
pub mod session;
pub mod time;
pub mod vote;
pub mod voter;

pub use candidate::CandidateId;
pub use lamport::LamportStamp;
pub use session::{SessionId, SessionStatus};
pub use time::Timestamp;
pub use vote::{VoteOutcome, VoteRequest};
pub use voter::{VoterId, VoterRecord};
