//! Channel-backed request/response transport to replica tasks.
//!
//! Each replica runs as a tokio task owning its [`ReplicaNode`] and a local
//! [`SyncedClock`]. The coordinator side holds a [`ReplicaHandle`] and makes
//! request/response calls over an mpsc/oneshot pair, every call bounded by a
//! timeout. Handles carry a reachability toggle so fault injection (and
//! tests) can partition a replica without tearing its task down.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use ballot_clock::SyncedClock;
use ballot_types::Timestamp;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::entry::{ReplicaSnapshot, ReplicationEntry};
use crate::error::ReplicationError;
use crate::replica::{ApplyOutcome, ReplicaHealth, ReplicaNode};

/// Request channel depth per replica.
const REQUEST_CHANNEL_CAPACITY: usize = 256;

/// Identifier of a configured replica node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ReplicaId(u32);

impl ReplicaId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn value(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for ReplicaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "replica#{}", self.0)
    }
}

enum ReplicaRequest {
    Replicate(ReplicationEntry, oneshot::Sender<ApplyOutcome>),
    Abort(u64, oneshot::Sender<bool>),
    Resync(ReplicaSnapshot, oneshot::Sender<u64>),
    Health(oneshot::Sender<ReplicaHealth>),
    ReadClock(oneshot::Sender<Timestamp>),
    AdjustClock(i64),
}

/// Coordinator-side handle to one replica task.
#[derive(Clone)]
pub struct ReplicaHandle {
    id: ReplicaId,
    tx: mpsc::Sender<ReplicaRequest>,
    reachable: Arc<AtomicBool>,
    responsive: Arc<AtomicBool>,
    call_timeout: Duration,
}

impl ReplicaHandle {
    pub fn id(&self) -> ReplicaId {
        self.id
    }

    /// Simulate (or lift) a network partition of this replica. Calls fail
    /// fast with [`ReplicationError::Unreachable`].
    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    pub fn is_reachable(&self) -> bool {
        self.reachable.load(Ordering::SeqCst)
    }

    /// Simulate a hung replica: requests are delivered but never answered,
    /// so callers run into the per-call timeout.
    pub fn set_responsive(&self, responsive: bool) {
        self.responsive.store(responsive, Ordering::SeqCst);
    }

    pub async fn replicate(&self, entry: ReplicationEntry) -> Result<ApplyOutcome, ReplicationError> {
        self.begin_replicate(entry).await?.wait().await
    }

    /// Enqueue a replicate request without waiting for the acknowledgment.
    ///
    /// The manager dispatches entries in sequence order, then awaits the
    /// acknowledgments concurrently; the mpsc channel preserves the dispatch
    /// order, so a reachable replica never sees a sequence gap.
    pub async fn begin_replicate(
        &self,
        entry: ReplicationEntry,
    ) -> Result<PendingAck, ReplicationError> {
        if !self.is_reachable() {
            return Err(ReplicationError::Unreachable(self.id));
        }
        let (tx, rx) = oneshot::channel();
        self.tx
            .send(ReplicaRequest::Replicate(entry, tx))
            .await
            .map_err(|_| ReplicationError::Unreachable(self.id))?;
        Ok(PendingAck {
            id: self.id,
            rx,
            timeout: self.call_timeout,
        })
    }

    /// Deliver an abort tombstone for a sequence that failed quorum.
    ///
    /// Fire-and-forget: the mpsc channel is processed serially, so the abort
    /// takes effect before any later request sent over this handle.
    pub async fn notify_abort(&self, sequence: u64) -> Result<(), ReplicationError> {
        if !self.is_reachable() {
            return Err(ReplicationError::Unreachable(self.id));
        }
        let (tx, _discard) = oneshot::channel();
        self.tx
            .send(ReplicaRequest::Abort(sequence, tx))
            .await
            .map_err(|_| ReplicationError::Unreachable(self.id))
    }

    pub async fn resync(&self, snapshot: ReplicaSnapshot) -> Result<u64, ReplicationError> {
        self.call(|tx| ReplicaRequest::Resync(snapshot, tx)).await
    }

    pub async fn health(&self) -> Result<ReplicaHealth, ReplicationError> {
        self.call(ReplicaRequest::Health).await
    }

    /// Read the replica's corrected wall clock (Berkeley poll).
    pub async fn read_clock(&self) -> Result<Timestamp, ReplicationError> {
        self.call(ReplicaRequest::ReadClock).await
    }

    /// Push a corrective clock delta (Berkeley broadcast). Fire-and-forget.
    pub async fn adjust_clock(&self, delta_ms: i64) -> Result<(), ReplicationError> {
        if !self.is_reachable() {
            return Err(ReplicationError::Unreachable(self.id));
        }
        self.tx
            .send(ReplicaRequest::AdjustClock(delta_ms))
            .await
            .map_err(|_| ReplicationError::Unreachable(self.id))
    }

    async fn call<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> ReplicaRequest,
    ) -> Result<T, ReplicationError> {
        if !self.is_reachable() {
            return Err(ReplicationError::Unreachable(self.id));
        }
        let (tx, rx) = oneshot::channel();
        self.tx
            .send(build(tx))
            .await
            .map_err(|_| ReplicationError::Unreachable(self.id))?;
        match tokio::time::timeout(self.call_timeout, rx).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(_)) => Err(ReplicationError::Unreachable(self.id)),
            Err(_) => Err(ReplicationError::Timeout(self.id)),
        }
    }
}

/// An in-flight replicate call whose acknowledgment has not arrived yet.
pub struct PendingAck {
    id: ReplicaId,
    rx: oneshot::Receiver<ApplyOutcome>,
    timeout: Duration,
}

impl PendingAck {
    pub fn replica(&self) -> ReplicaId {
        self.id
    }

    /// Await the acknowledgment under the per-call timeout.
    pub async fn wait(self) -> Result<ApplyOutcome, ReplicationError> {
        match tokio::time::timeout(self.timeout, self.rx).await {
            Ok(Ok(outcome)) => Ok(outcome),
            Ok(Err(_)) => Err(ReplicationError::Unreachable(self.id)),
            Err(_) => Err(ReplicationError::Timeout(self.id)),
        }
    }
}

/// Spawn a replica task and return the handle to it.
///
/// The task exits when every handle is dropped.
pub fn spawn_replica(id: ReplicaId, call_timeout: Duration) -> (ReplicaHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(REQUEST_CHANNEL_CAPACITY);
    let responsive = Arc::new(AtomicBool::new(true));
    let task = tokio::spawn(run_replica(id, rx, Arc::clone(&responsive)));
    (
        ReplicaHandle {
            id,
            tx,
            reachable: Arc::new(AtomicBool::new(true)),
            responsive,
            call_timeout,
        },
        task,
    )
}

async fn run_replica(id: ReplicaId, mut rx: mpsc::Receiver<ReplicaRequest>, responsive: Arc<AtomicBool>) {
    let mut node = ReplicaNode::new(id);
    let clock = SyncedClock::new();
    // Requests swallowed while hung; holding them keeps the reply senders
    // alive so callers run into their timeout instead of an instant error.
    let mut swallowed = Vec::new();

    while let Some(request) = rx.recv().await {
        if !responsive.load(Ordering::SeqCst) {
            swallowed.push(request);
            continue;
        }
        swallowed.clear();
        match request {
            ReplicaRequest::Replicate(entry, reply) => {
                let _ = reply.send(node.replicate(entry));
            }
            ReplicaRequest::Abort(sequence, reply) => {
                let _ = reply.send(node.abort(sequence));
            }
            ReplicaRequest::Resync(snapshot, reply) => {
                let _ = reply.send(node.install_snapshot(snapshot));
            }
            ReplicaRequest::Health(reply) => {
                let _ = reply.send(node.health());
            }
            ReplicaRequest::ReadClock(reply) => {
                let _ = reply.send(clock.now());
            }
            ReplicaRequest::AdjustClock(delta_ms) => {
                clock.adjust(delta_ms);
            }
        }
    }
    tracing::debug!(replica = %id, "replica task stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use ballot_types::{CandidateId, LamportStamp, VoterId};

    fn entry(seq: u64, voter: u32) -> ReplicationEntry {
        ReplicationEntry::apply_vote(
            seq,
            VoterId::new(voter),
            CandidateId::new("Candidate A"),
            LamportStamp::new(seq),
        )
    }

    #[tokio::test]
    async fn replicate_round_trip() {
        let (handle, _task) = spawn_replica(ReplicaId::new(1), Duration::from_millis(500));
        let outcome = handle.replicate(entry(1, 1)).await.unwrap();
        assert_eq!(outcome, ApplyOutcome::Applied { last_applied: 1 });

        let health = handle.health().await.unwrap();
        assert_eq!(health.last_applied, 1);
    }

    #[tokio::test]
    async fn unreachable_handle_fails_fast() {
        let (handle, _task) = spawn_replica(ReplicaId::new(2), Duration::from_millis(500));
        handle.set_reachable(false);
        match handle.replicate(entry(1, 1)).await {
            Err(ReplicationError::Unreachable(id)) => assert_eq!(id, ReplicaId::new(2)),
            other => panic!("expected Unreachable, got {other:?}"),
        }

        handle.set_reachable(true);
        assert!(handle.replicate(entry(1, 1)).await.is_ok());
    }

    #[tokio::test]
    async fn unresponsive_replica_times_out() {
        let (handle, _task) = spawn_replica(ReplicaId::new(4), Duration::from_millis(100));
        handle.set_responsive(false);
        match handle.replicate(entry(1, 1)).await {
            Err(ReplicationError::Timeout(id)) => assert_eq!(id, ReplicaId::new(4)),
            other => panic!("expected Timeout, got {other:?}"),
        }

        handle.set_responsive(true);
        let health = handle.health().await.unwrap();
        assert_eq!(health.last_applied, 0); // the swallowed entry never applied
    }

    #[tokio::test]
    async fn clock_adjustment_shifts_readings() {
        let (handle, _task) = spawn_replica(ReplicaId::new(3), Duration::from_millis(500));
        let before = handle.read_clock().await.unwrap();
        handle.adjust_clock(60_000).await.unwrap();
        let after = handle.read_clock().await.unwrap();
        // Shifted a minute forward, minus however long the calls took.
        assert!(after.as_millis() >= before.as_millis() + 59_000);
    }
}
