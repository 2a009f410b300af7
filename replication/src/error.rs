use crate::transport::ReplicaId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReplicationError {
    /// Fewer than a strict majority of the configured node set acknowledged
    /// the entry. It has been rolled back everywhere it landed.
    #[error("entry {sequence} failed quorum: {acks} of {required} required acknowledgments")]
    QuorumNotReached {
        sequence: u64,
        acks: usize,
        required: usize,
    },

    /// Too few replicas are even reachable for a quorum to be possible.
    /// Votes fail closed until connectivity recovers.
    #[error("entry {sequence} majority unreachable: {reachable} reachable, {required} required")]
    MajorityUnreachable {
        sequence: u64,
        reachable: usize,
        required: usize,
    },

    /// The replica's request channel is gone or the node rejected the call.
    #[error("{0} unreachable")]
    Unreachable(ReplicaId),

    /// The replica did not answer within the per-call timeout.
    #[error("{0} timed out")]
    Timeout(ReplicaId),
}
