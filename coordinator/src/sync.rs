//! The periodic clock-synchronization round.
//!
//! The coordinator acts as the Berkeley master: it polls every replica's
//! corrected wall clock under the usual per-call timeout, plans the round,
//! then applies its own delta and pushes a corrective delta to every peer
//! that answered. Unreachable replicas are skipped and corrected on a later
//! round. The loop never touches vote processing; it only moves the offset
//! the deadline checks read.

use std::sync::Arc;
use std::time::Duration;

use ballot_clock::RoundPlan;
use tokio::time::MissedTickBehavior;

use crate::coordinator::Coordinator;
use crate::events::CoordinatorEvent;

impl Coordinator {
    /// Run one Berkeley round. Returns the plan, or `None` when no replica
    /// answered the poll.
    pub async fn clock_sync_round(&self) -> Option<RoundPlan> {
        let handles = self.replication().replica_handles();

        let mut readings = Vec::with_capacity(handles.len());
        for handle in handles {
            readings.push(match handle.read_clock().await {
                Ok(reading) => Some(reading.as_millis() as i64),
                Err(err) => {
                    tracing::debug!(replica = %handle.id(), %err, "clock poll failed");
                    None
                }
            });
        }

        let local = self.synced_clock().now().as_millis() as i64;
        let plan = self.berkeley.plan_round(local, &readings)?;

        self.synced_clock().adjust(plan.local_delta_ms);
        for (handle, delta) in handles.iter().zip(&plan.peer_deltas_ms) {
            if let Some(delta) = delta {
                if let Err(err) = handle.adjust_clock(*delta).await {
                    tracing::debug!(replica = %handle.id(), %err, "clock correction not delivered");
                }
            }
        }

        self.emit(&CoordinatorEvent::ClockSynced {
            agreed_ms: plan.agreed_ms,
            participants: plan.participants,
        });
        Some(plan)
    }
}

/// Drive [`Coordinator::clock_sync_round`] on a fixed period, forever.
pub async fn run_clock_sync(coordinator: Arc<Coordinator>, period: Duration) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        interval.tick().await;
        coordinator.clock_sync_round().await;
    }
}
