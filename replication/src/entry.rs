//! Replication log entries and full-state snapshots.

use ballot_types::{CandidateId, LamportStamp, VoterId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A state change proposed for replication.
///
/// Session transitions and roster resets travel as full-state snapshots
/// (see [`ReplicaSnapshot`]), so votes are the only sequenced operation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    /// Record a committed vote for `voter`.
    ApplyVote {
        voter: VoterId,
        candidate: CandidateId,
    },
}

/// One sequenced replication entry.
///
/// Sequence numbers are assigned by the coordinator's replication manager,
/// strictly increasing and gapless. An entry is committed only after quorum
/// acknowledgment; until then it is proposed and subject to rollback.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicationEntry {
    pub sequence: u64,
    pub operation: Operation,
    /// The Lamport stamp of the originating vote request.
    pub origin_stamp: LamportStamp,
}

impl ReplicationEntry {
    pub fn apply_vote(
        sequence: u64,
        voter: VoterId,
        candidate: CandidateId,
        origin_stamp: LamportStamp,
    ) -> Self {
        Self {
            sequence,
            operation: Operation::ApplyVote { voter, candidate },
            origin_stamp,
        }
    }
}

/// Full replica state, sent when a replica needs to resync.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicaSnapshot {
    /// The sequence number this snapshot is current as of.
    pub sequence: u64,
    /// Committed votes, keyed by voter.
    pub votes: HashMap<VoterId, CandidateId>,
}

impl ReplicaSnapshot {
    pub fn new(sequence: u64, votes: HashMap<VoterId, CandidateId>) -> Self {
        Self { sequence, votes }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_vote_constructor() {
        let entry = ReplicationEntry::apply_vote(
            7,
            VoterId::new(1),
            CandidateId::new("Candidate A"),
            LamportStamp::new(42),
        );
        assert_eq!(entry.sequence, 7);
        assert_eq!(entry.origin_stamp, LamportStamp::new(42));
        let Operation::ApplyVote { voter, candidate } = entry.operation;
        assert_eq!(voter, VoterId::new(1));
        assert_eq!(candidate, CandidateId::new("Candidate A"));
    }
}
