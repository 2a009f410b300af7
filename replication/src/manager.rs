//! Replication manager — quorum fan-out, rollback, and health tracking.
//!
//! Proposals for distinct votes may be in flight concurrently, but they
//! resolve (commit or abort) strictly in sequence order through a watch-based
//! gate, so no entry's outcome becomes visible before its predecessors'.
//! Quorum is always measured against the originally configured node set:
//! health-based exclusion stops wasted fan-out but never lowers the
//! threshold, and a minority partition fails closed.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use ballot_types::LamportStamp;
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use tokio::sync::{watch, Mutex};

use crate::entry::{Operation, ReplicaSnapshot, ReplicationEntry};
use crate::error::ReplicationError;
use crate::replica::ApplyOutcome;
use crate::transport::{ReplicaHandle, ReplicaId};

/// Consecutive failed calls before a replica is excluded from fan-out.
pub const DEFAULT_UNHEALTHY_AFTER: u32 = 3;

/// How acknowledgments are counted against the configured node set.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct QuorumPolicy {
    /// Whether the coordinator's own apply counts as one acknowledgment.
    /// The reference deployment is one coordinator plus two replicas with
    /// this enabled: 3 nodes total, 2 acknowledgments required.
    pub count_coordinator: bool,
}

impl QuorumPolicy {
    pub fn total_nodes(&self, replica_count: usize) -> usize {
        replica_count + usize::from(self.count_coordinator)
    }

    /// Strict majority of the configured node set.
    pub fn required_acks(&self, replica_count: usize) -> usize {
        self.total_nodes(replica_count) / 2 + 1
    }

    /// Acknowledgments that must come from replicas.
    pub fn required_replica_acks(&self, replica_count: usize) -> usize {
        self.required_acks(replica_count)
            .saturating_sub(usize::from(self.count_coordinator))
    }
}

impl Default for QuorumPolicy {
    fn default() -> Self {
        Self {
            count_coordinator: true,
        }
    }
}

/// Manager-side view of one replica, updated on every call outcome.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReplicaState {
    pub id: ReplicaId,
    pub last_acked_sequence: u64,
    pub healthy: bool,
    pub consecutive_failures: u32,
    /// The replica asked for a snapshot resync (gap or restart).
    pub needs_resync: bool,
}

impl ReplicaState {
    fn new(id: ReplicaId) -> Self {
        Self {
            id,
            last_acked_sequence: 0,
            healthy: true,
            consecutive_failures: 0,
            needs_resync: false,
        }
    }
}

/// Drives quorum replication across the configured replica set.
pub struct ReplicationManager {
    inner: Arc<Inner>,
}

struct Inner {
    replicas: Vec<ReplicaHandle>,
    policy: QuorumPolicy,
    unhealthy_after: u32,
    states: Mutex<Vec<ReplicaState>>,
    next_sequence: AtomicU64,
    /// Highest sequence whose fan-out has been enqueued, strictly in order.
    /// Serialized dispatch means a reachable replica never sees a gap.
    dispatched_tx: watch::Sender<u64>,
    /// Highest sequence resolved (committed or aborted), strictly in order.
    resolved_tx: watch::Sender<u64>,
}

impl ReplicationManager {
    pub fn new(replicas: Vec<ReplicaHandle>, policy: QuorumPolicy) -> Self {
        let states = replicas.iter().map(|r| ReplicaState::new(r.id())).collect();
        let (dispatched_tx, _) = watch::channel(0);
        let (resolved_tx, _) = watch::channel(0);
        Self {
            inner: Arc::new(Inner {
                replicas,
                policy,
                unhealthy_after: DEFAULT_UNHEALTHY_AFTER,
                states: Mutex::new(states),
                next_sequence: AtomicU64::new(0),
                dispatched_tx,
                resolved_tx,
            }),
        }
    }

    pub fn policy(&self) -> QuorumPolicy {
        self.inner.policy
    }

    pub fn replica_handles(&self) -> &[ReplicaHandle] {
        &self.inner.replicas
    }

    /// Highest sequence number resolved so far.
    pub fn resolved_sequence(&self) -> u64 {
        *self.inner.resolved_tx.borrow()
    }

    /// Current manager-side replica states, in configuration order.
    pub async fn replica_states(&self) -> Vec<ReplicaState> {
        self.inner.states.lock().await.clone()
    }

    /// Propose an operation for quorum replication.
    ///
    /// Returns the committed entry on quorum, or an error after rolling the
    /// entry back everywhere it partially landed. The round itself runs on a
    /// detached task: a caller that goes away mid-propose (a dropped
    /// connection cancels its handler future) never leaves the assigned
    /// sequence unresolved, which would stall every successor in the gate.
    pub async fn propose(
        &self,
        operation: Operation,
        origin_stamp: LamportStamp,
    ) -> Result<ReplicationEntry, ReplicationError> {
        let inner = Arc::clone(&self.inner);
        let sequence = inner.next_sequence.fetch_add(1, Ordering::SeqCst) + 1;
        let entry = ReplicationEntry {
            sequence,
            operation,
            origin_stamp,
        };

        let round_entry = entry.clone();
        let round = tokio::spawn(async move {
            let outcome = inner.replicate_round(&round_entry).await;

            // Resolve strictly in sequence order, aborts included.
            wait_for(&inner.resolved_tx, sequence - 1).await;
            inner.resolved_tx.send_replace(sequence);
            outcome
        });

        match round.await {
            Ok(Ok(acks)) => {
                tracing::debug!(sequence, acks, "entry committed by quorum");
                Ok(entry)
            }
            Ok(Err(err)) => {
                tracing::warn!(sequence, %err, "entry aborted");
                Err(err)
            }
            // The round task is never aborted, so a join error is a panic.
            Err(err) => std::panic::resume_unwind(err.into_panic()),
        }
    }

    /// Undo a committed entry on every replica.
    ///
    /// Used when the coordinator rejects an entry after quorum already
    /// acknowledged it (the session closed mid-replication). Delivered as
    /// the same abort tombstone that failed proposals use.
    pub async fn rollback(&self, sequence: u64) {
        for replica in &self.inner.replicas {
            if let Err(err) = replica.notify_abort(sequence).await {
                tracing::debug!(replica = %replica.id(), sequence, %err, "rollback delivery failed");
            }
        }
    }

    /// Poll every replica's health, refresh states, and resync any replica
    /// that is lagging behind the given snapshot or asked for one.
    pub async fn health_check_all(&self, snapshot: ReplicaSnapshot) -> Vec<ReplicaState> {
        let inner = &self.inner;
        for (index, replica) in inner.replicas.iter().enumerate() {
            match replica.health().await {
                Ok(health) => {
                    let lagging = health.last_applied < snapshot.sequence || health.buffered > 0;
                    let needed = {
                        let mut states = inner.states.lock().await;
                        let state = &mut states[index];
                        state.healthy = true;
                        state.consecutive_failures = 0;
                        state.last_acked_sequence = health.last_applied;
                        lagging || state.needs_resync
                    };
                    if needed {
                        match replica.resync(snapshot.clone()).await {
                            Ok(last_applied) => {
                                let mut states = inner.states.lock().await;
                                let state = &mut states[index];
                                state.last_acked_sequence = last_applied;
                                state.needs_resync = false;
                                tracing::info!(replica = %replica.id(), last_applied, "replica resynced");
                            }
                            Err(err) => {
                                tracing::warn!(replica = %replica.id(), %err, "resync failed");
                            }
                        }
                    }
                }
                Err(err) => {
                    let mut states = inner.states.lock().await;
                    let state = &mut states[index];
                    state.consecutive_failures += 1;
                    if state.consecutive_failures >= inner.unhealthy_after && state.healthy {
                        state.healthy = false;
                        tracing::warn!(
                            replica = %replica.id(),
                            failures = state.consecutive_failures,
                            "replica marked unhealthy, excluded from fan-out"
                        );
                    }
                    tracing::debug!(replica = %replica.id(), %err, "health check failed");
                }
            }
        }
        self.replica_states().await
    }

    /// Push a full snapshot to every replica (session rollover).
    pub async fn resync_all(&self, snapshot: ReplicaSnapshot) {
        for replica in &self.inner.replicas {
            if let Err(err) = replica.resync(snapshot.clone()).await {
                tracing::warn!(replica = %replica.id(), %err, "rollover resync failed");
            }
        }
    }
}

impl Inner {
    async fn replicate_round(&self, entry: &ReplicationEntry) -> Result<usize, ReplicationError> {
        let required = self.policy.required_replica_acks(self.replicas.len());
        let required_total = self.policy.required_acks(self.replicas.len());

        // Fan out only to replicas not currently excluded.
        let targets: Vec<(usize, &ReplicaHandle)> = {
            let states = self.states.lock().await;
            self.replicas
                .iter()
                .enumerate()
                .filter(|(i, _)| states[*i].healthy)
                .collect()
        };

        // Dispatch in sequence order: enqueue the entry on every target's
        // channel before the next sequence may, then await acknowledgments
        // concurrently. This keeps reachable replicas gap-free without
        // serializing the waits.
        wait_for(&self.dispatched_tx, entry.sequence - 1).await;

        if targets.len() < required {
            // Fail closed without sending the entry anywhere, but deliver
            // tombstones before releasing the gate so the skipped sequence
            // cannot wedge the in-order apply rule.
            for (_, replica) in &targets {
                let _ = replica.notify_abort(entry.sequence).await;
            }
            self.dispatched_tx.send_replace(entry.sequence);
            return Err(ReplicationError::MajorityUnreachable {
                sequence: entry.sequence,
                reachable: targets.len() + usize::from(self.policy.count_coordinator),
                required: required_total,
            });
        }

        let mut pending = Vec::with_capacity(targets.len());
        let mut failures: Vec<(usize, ReplicationError)> = Vec::new();
        for (index, replica) in &targets {
            match replica.begin_replicate(entry.clone()).await {
                Ok(ack) => pending.push((*index, ack)),
                Err(err) => failures.push((*index, err)),
            }
        }
        self.dispatched_tx.send_replace(entry.sequence);

        let waits = pending
            .into_iter()
            .map(|(index, ack)| async move { (index, ack.wait().await) });
        let mut results = join_all(waits).await;
        results.extend(failures.into_iter().map(|(i, e)| (i, Err(e))));

        let mut acks = 0usize;
        {
            let mut states = self.states.lock().await;
            for (index, result) in &results {
                let state = &mut states[*index];
                match result {
                    Ok(outcome) if outcome.is_ack() => {
                        state.consecutive_failures = 0;
                        state.last_acked_sequence = entry.sequence;
                        acks += 1;
                    }
                    Ok(ApplyOutcome::NeedsResync { .. }) => {
                        state.needs_resync = true;
                    }
                    Ok(_) => {}
                    Err(err) => {
                        state.consecutive_failures += 1;
                        if state.consecutive_failures >= self.unhealthy_after {
                            state.healthy = false;
                        }
                        tracing::debug!(replica = %self.replicas[*index].id(), %err, "replicate call failed");
                    }
                }
            }
        }

        if acks >= required {
            return Ok(acks + usize::from(self.policy.count_coordinator));
        }

        // Quorum failed: deliver abort tombstones so the sequence never
        // wedges a replica, undoing the entry wherever it already applied.
        for (_, replica) in &targets {
            if let Err(err) = replica.notify_abort(entry.sequence).await {
                tracing::debug!(%err, sequence = entry.sequence, "abort delivery failed");
            }
        }

        Err(ReplicationError::QuorumNotReached {
            sequence: entry.sequence,
            acks: acks + usize::from(self.policy.count_coordinator),
            required: required_total,
        })
    }
}

async fn wait_for(counter: &watch::Sender<u64>, threshold: u64) {
    let mut rx = counter.subscribe();
    loop {
        if *rx.borrow_and_update() >= threshold {
            return;
        }
        if rx.changed().await.is_err() {
            return;
        }
    }
}

/// Spawn `count` replicas and a manager over them.
///
/// Convenience wiring for the daemon and tests; replica ids are `1..=count`.
pub fn spawn_replica_set(
    count: usize,
    call_timeout: Duration,
    policy: QuorumPolicy,
) -> ReplicationManager {
    let replicas = (1..=count as u32)
        .map(|id| crate::transport::spawn_replica(ReplicaId::new(id), call_timeout).0)
        .collect();
    ReplicationManager::new(replicas, policy)
}
