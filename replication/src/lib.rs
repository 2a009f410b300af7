//! Quorum replication for committed votes.
//!
//! The coordinator proposes a [`ReplicationEntry`] per accepted vote; the
//! [`ReplicationManager`] fans it out to every configured replica in
//! parallel, commits once a strict majority acknowledges, and rolls the
//! entry back everywhere it partially landed when quorum fails. Replicas are
//! passive stores that apply entries strictly in sequence order.

pub mod entry;
pub mod error;
pub mod manager;
pub mod replica;
pub mod transport;

pub use entry::{Operation, ReplicaSnapshot, ReplicationEntry};
pub use error::ReplicationError;
pub use manager::{QuorumPolicy, ReplicaState, ReplicationManager};
pub use replica::{ApplyOutcome, ReplicaHealth, ReplicaNode};
pub use manager::spawn_replica_set;
pub use transport::{spawn_replica, PendingAck, ReplicaHandle, ReplicaId};
