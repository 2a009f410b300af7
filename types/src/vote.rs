//! Vote request and outcome — the pair that crosses the coordinator boundary.

use crate::{CandidateId, LamportStamp, Timestamp, VoterId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// An admitted, stamped vote submission.
///
/// Immutable once created; consumed exactly once (committed, rejected, or
/// rolled back). The arrival stamp is assigned by the coordinator's Lamport
/// clock when the request passes the admission gate, not by the client.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteRequest {
    pub voter: VoterId,
    pub candidate: CandidateId,
    /// The client-reported moment the voter clicked — compared against the
    /// session deadline so queued voters are not penalised for backlog.
    pub client_click_time: Timestamp,
    pub arrival_stamp: LamportStamp,
}

impl VoteRequest {
    /// The total-order key for conflict resolution: lower `(stamp, voter)`
    /// tuple wins among concurrent submissions.
    pub fn order_key(&self) -> (LamportStamp, VoterId) {
        (self.arrival_stamp, self.voter)
    }
}

/// Outcome of a vote submission, as seen by the caller.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteOutcome {
    /// Committed by a replication quorum and counted.
    Accepted,
    /// The voter has already voted (or lost the duplicate-submission race).
    AlreadyVoted,
    /// The session is not accepting votes.
    VotingInactive,
    /// The click time fell after the session deadline.
    DeadlineExceeded,
    /// The voter is not on the roster.
    UnknownVoter,
    /// The candidate is not on the ballot.
    UnknownCandidate,
    /// The admission queue timed out; safe to retry with backoff.
    SystemBusy,
    /// Quorum replication failed and was rolled back; safe to retry.
    ReplicationFailed,
}

impl VoteOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, VoteOutcome::Accepted)
    }

    /// Whether a retry can possibly succeed without operator intervention.
    pub fn is_retryable(&self) -> bool {
        matches!(self, VoteOutcome::SystemBusy | VoteOutcome::ReplicationFailed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VoteOutcome::Accepted => "accepted",
            VoteOutcome::AlreadyVoted => "already_voted",
            VoteOutcome::VotingInactive => "voting_inactive",
            VoteOutcome::DeadlineExceeded => "deadline_exceeded",
            VoteOutcome::UnknownVoter => "unknown_voter",
            VoteOutcome::UnknownCandidate => "unknown_candidate",
            VoteOutcome::SystemBusy => "system_busy",
            VoteOutcome::ReplicationFailed => "replication_failed",
        }
    }
}

impl fmt::Display for VoteOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
