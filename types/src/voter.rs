//! Voter identity and the per-voter authoritative record.

use crate::CandidateId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique voter identifier from the static roster.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VoterId(u32);

impl VoterId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn value(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for VoterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "voter#{}", self.0)
    }
}

/// Authoritative per-voter state.
///
/// Owned by the coordinator's registry; mutated only by a committed vote,
/// never deleted within a session, and reset wholesale at session rollover.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoterRecord {
    pub id: VoterId,
    pub name: String,
    pub has_voted: bool,
    pub chosen_candidate: Option<CandidateId>,
}

impl VoterRecord {
    /// A fresh record for a roster entry that has not voted yet.
    pub fn new(id: VoterId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            has_voted: false,
            chosen_candidate: None,
        }
    }

    /// Mark the committed vote. Only called after quorum replication.
    pub fn record_vote(&mut self, candidate: CandidateId) {
        self.has_voted = true;
        self.chosen_candidate = Some(candidate);
    }

    /// Undo a vote that failed to reach quorum.
    pub fn clear_vote(&mut self) {
        self.has_voted = false;
        self.chosen_candidate = None;
    }

    /// Reset for a new session.
    pub fn reset(&mut self) {
        self.clear_vote();
    }
}
