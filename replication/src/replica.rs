//! Passive replica store.
//!
//! A replica applies entries strictly in sequence order: sequence `N + 1`
//! only after `N`. Anything that arrives early is buffered and answered with
//! a resync request; the manager resolves the gap by resending a full
//! snapshot. Acknowledgment happens only after a successful local apply.
//!
//! Aborted sequences are delivered as tombstones: an abort both undoes the
//! entry where it was applied and fills the sequence gap where it was not,
//! so an aborted proposal never wedges the in-order apply rule.

use crate::entry::{Operation, ReplicaSnapshot, ReplicationEntry};
use crate::transport::ReplicaId;
use ballot_types::{CandidateId, VoterId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Result of offering an entry to a replica.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApplyOutcome {
    /// The entry (and possibly buffered successors) applied locally.
    /// This is the acknowledgment the quorum counts.
    Applied { last_applied: u64 },
    /// The entry arrived ahead of a gap; it was buffered, not applied.
    /// The manager should resend a full snapshot.
    NeedsResync { last_applied: u64 },
    /// The entry's sequence was already consumed (duplicate delivery).
    Duplicate { last_applied: u64 },
}

impl ApplyOutcome {
    /// Whether this response counts as a quorum acknowledgment.
    pub fn is_ack(&self) -> bool {
        matches!(self, ApplyOutcome::Applied { .. } | ApplyOutcome::Duplicate { .. })
    }
}

/// Health report for one replica.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicaHealth {
    pub id: ReplicaId,
    pub last_applied: u64,
    /// Applied votes currently held.
    pub votes: usize,
    /// Entries buffered ahead of a sequence gap.
    pub buffered: usize,
}

/// A sequenced slot waiting for its turn: a real entry or an abort tombstone.
#[derive(Clone, Debug)]
enum Slot {
    Entry(ReplicationEntry),
    Tombstone,
}

/// In-memory state of one replica node.
pub struct ReplicaNode {
    id: ReplicaId,
    /// Highest sequence consumed, whether applied or aborted.
    last_applied: u64,
    votes: HashMap<VoterId, CandidateId>,
    /// Which voter each applied sequence touched, for abort undo.
    applied_log: BTreeMap<u64, VoterId>,
    /// Out-of-order slots held until the gap fills or a snapshot arrives.
    pending: BTreeMap<u64, Slot>,
}

impl ReplicaNode {
    pub fn new(id: ReplicaId) -> Self {
        Self {
            id,
            last_applied: 0,
            votes: HashMap::new(),
            applied_log: BTreeMap::new(),
            pending: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> ReplicaId {
        self.id
    }

    pub fn last_applied(&self) -> u64 {
        self.last_applied
    }

    /// Committed votes currently held by this replica.
    pub fn votes(&self) -> &HashMap<VoterId, CandidateId> {
        &self.votes
    }

    /// Offer an entry for application.
    pub fn replicate(&mut self, entry: ReplicationEntry) -> ApplyOutcome {
        if entry.sequence <= self.last_applied {
            return ApplyOutcome::Duplicate {
                last_applied: self.last_applied,
            };
        }
        if entry.sequence != self.last_applied + 1 {
            tracing::debug!(
                replica = %self.id,
                sequence = entry.sequence,
                last_applied = self.last_applied,
                "out-of-order entry buffered, requesting resync"
            );
            self.pending.insert(entry.sequence, Slot::Entry(entry));
            return ApplyOutcome::NeedsResync {
                last_applied: self.last_applied,
            };
        }

        self.apply(entry);
        self.drain_pending();
        ApplyOutcome::Applied {
            last_applied: self.last_applied,
        }
    }

    /// Consume an aborted sequence.
    ///
    /// Where the entry was applied, its vote is undone; where the sequence
    /// has not arrived yet, the abort acts as a gap-filling tombstone so
    /// later entries can still apply in order. Returns whether local state
    /// changed.
    pub fn abort(&mut self, sequence: u64) -> bool {
        if sequence <= self.last_applied {
            if let Some(voter) = self.applied_log.remove(&sequence) {
                self.votes.remove(&voter);
                tracing::debug!(replica = %self.id, sequence, "applied entry rolled back");
                return true;
            }
            return false;
        }
        if sequence == self.last_applied + 1 {
            self.last_applied = sequence;
            self.drain_pending();
            return true;
        }
        self.pending.insert(sequence, Slot::Tombstone);
        true
    }

    /// Replace local state with a full snapshot, then drain anything
    /// buffered past the snapshot point.
    ///
    /// A snapshot older than the applied state is ignored: sequences are
    /// globally monotonic, so local state past the snapshot point is strictly
    /// newer and rewinding it would erase committed entries.
    pub fn install_snapshot(&mut self, snapshot: ReplicaSnapshot) -> u64 {
        if snapshot.sequence < self.last_applied {
            tracing::debug!(
                replica = %self.id,
                snapshot = snapshot.sequence,
                last_applied = self.last_applied,
                "stale snapshot ignored"
            );
            return self.last_applied;
        }
        self.votes = snapshot.votes;
        self.last_applied = snapshot.sequence;
        self.applied_log.clear();
        self.pending = self.pending.split_off(&(snapshot.sequence + 1));
        self.drain_pending();
        tracing::info!(replica = %self.id, last_applied = self.last_applied, "snapshot installed");
        self.last_applied
    }

    pub fn health(&self) -> ReplicaHealth {
        ReplicaHealth {
            id: self.id,
            last_applied: self.last_applied,
            votes: self.votes.len(),
            buffered: self.pending.len(),
        }
    }

    fn apply(&mut self, entry: ReplicationEntry) {
        let Operation::ApplyVote { voter, candidate } = entry.operation;
        self.votes.insert(voter, candidate);
        self.applied_log.insert(entry.sequence, voter);
        self.last_applied = entry.sequence;
    }

    fn drain_pending(&mut self) {
        while let Some(slot) = self.pending.remove(&(self.last_applied + 1)) {
            match slot {
                Slot::Entry(entry) => self.apply(entry),
                Slot::Tombstone => self.last_applied += 1,
            }
        }
    }
}
