//! Events emitted by the coordinator for observers.
//!
//! The coordinator publishes to a set of [`EventSink`]s registered at build
//! time; it has no compile-time dependency on any particular consumer.
//! Sinks are invoked inline on the emitting task; keep them fast.

use ballot_types::{CandidateId, LamportStamp, SessionId, Timestamp, VoteOutcome, VoterId};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Mutex;

/// Everything observers can learn about from the coordinator.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CoordinatorEvent {
    /// A vote passed the admission gate and entered processing.
    VoteAdmitted { voter: VoterId, stamp: LamportStamp },
    /// A vote committed by quorum and was counted.
    VoteAccepted {
        voter: VoterId,
        candidate: CandidateId,
        stamp: LamportStamp,
    },
    /// A vote was turned away.
    VoteRejected { voter: VoterId, outcome: VoteOutcome },
    SessionStarted { id: SessionId, deadline: Timestamp },
    SessionClosed { id: SessionId },
    ResultsPublished { id: SessionId },
    SessionRolledOver { from: SessionId, to: SessionId },
    /// A clock-sync round converged.
    ClockSynced { agreed_ms: i64, participants: usize },
}

/// Observer interface the coordinator publishes to.
pub trait EventSink: Send + Sync {
    fn publish(&self, event: &CoordinatorEvent);
}

impl<S: EventSink + ?Sized> EventSink for std::sync::Arc<S> {
    fn publish(&self, event: &CoordinatorEvent) {
        (**self).publish(event);
    }
}

/// Sink that forwards events to the tracing subscriber.
pub struct TracingSink;

impl EventSink for TracingSink {
    fn publish(&self, event: &CoordinatorEvent) {
        match event {
            CoordinatorEvent::VoteAdmitted { voter, stamp } => {
                tracing::debug!(%voter, %stamp, "vote admitted");
            }
            CoordinatorEvent::VoteAccepted {
                voter,
                candidate,
                stamp,
            } => {
                tracing::info!(%voter, %candidate, %stamp, "vote accepted");
            }
            CoordinatorEvent::VoteRejected { voter, outcome } => {
                tracing::info!(%voter, %outcome, "vote rejected");
            }
            CoordinatorEvent::SessionStarted { id, deadline } => {
                tracing::info!(session = %id, %deadline, "session started");
            }
            CoordinatorEvent::SessionClosed { id } => {
                tracing::info!(session = %id, "session closed");
            }
            CoordinatorEvent::ResultsPublished { id } => {
                tracing::info!(session = %id, "results published");
            }
            CoordinatorEvent::SessionRolledOver { from, to } => {
                tracing::info!(%from, %to, "session rolled over");
            }
            CoordinatorEvent::ClockSynced {
                agreed_ms,
                participants,
            } => {
                tracing::debug!(agreed_ms, participants, "clock sync round converged");
            }
        }
    }
}

/// Bounded in-memory feed of recent events, oldest dropped first.
pub struct EventFeed {
    capacity: usize,
    events: Mutex<VecDeque<CoordinatorEvent>>,
}

impl EventFeed {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            events: Mutex::new(VecDeque::new()),
        }
    }

    /// Recent events, oldest first.
    pub fn recent(&self) -> Vec<CoordinatorEvent> {
        match self.events.lock() {
            Ok(events) => events.iter().cloned().collect(),
            Err(poisoned) => poisoned.into_inner().iter().cloned().collect(),
        }
    }
}

impl EventSink for EventFeed {
    fn publish(&self, event: &CoordinatorEvent) {
        let mut events = match self.events.lock() {
            Ok(events) => events,
            Err(poisoned) => poisoned.into_inner(),
        };
        if events.len() == self.capacity {
            events.pop_front();
        }
        events.push_back(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn started(id: u64) -> CoordinatorEvent {
        CoordinatorEvent::SessionStarted {
            id: SessionId::new(id),
            deadline: Timestamp::new(1_000),
        }
    }

    #[test]
    fn feed_keeps_most_recent_events() {
        let feed = EventFeed::new(2);
        feed.publish(&started(1));
        feed.publish(&started(2));
        feed.publish(&started(3));

        let recent = feed.recent();
        assert_eq!(recent.len(), 2);
        assert!(matches!(
            recent[0],
            CoordinatorEvent::SessionStarted { id, .. } if id == SessionId::new(2)
        ));
        assert!(matches!(
            recent[1],
            CoordinatorEvent::SessionStarted { id, .. } if id == SessionId::new(3)
        ));
    }

    #[test]
    fn events_serialize_with_a_kind_tag() {
        let json = serde_json::to_string(&started(1)).unwrap();
        assert!(json.contains("\"kind\":\"session_started\""));
    }
}
