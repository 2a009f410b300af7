//! One voting session and its lifecycle.

use ballot_types::{CandidateId, SessionId, SessionStatus, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::tally::TallyResult;
use crate::CoordinatorError;

/// A single voting session.
///
/// Lifecycle: `Pending → Active → Closed → Published`. The tally is
/// maintained incrementally as votes commit and frozen when the session
/// closes; a rollover archives the whole struct as a read-only record.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VotingSession {
    pub id: SessionId,
    pub status: SessionStatus,
    /// Synchronized wall-clock deadline; set when the session starts.
    pub deadline: Option<Timestamp>,
    /// Committed votes per candidate, zero-filled over the ballot.
    pub tally: BTreeMap<CandidateId, u64>,
    /// Final results, present once published.
    pub results: Option<TallyResult>,
}

impl VotingSession {
    /// A fresh pending session over the given ballot.
    pub fn new(id: SessionId, candidates: &[CandidateId]) -> Self {
        Self {
            id,
            status: SessionStatus::Pending,
            deadline: None,
            tally: candidates.iter().map(|c| (c.clone(), 0)).collect(),
            results: None,
        }
    }

    /// `Pending → Active` with the given deadline.
    pub fn start(&mut self, deadline: Timestamp) -> Result<(), CoordinatorError> {
        self.transition(SessionStatus::Pending, SessionStatus::Active)?;
        self.deadline = Some(deadline);
        Ok(())
    }

    /// `Active → Closed`; the tally is frozen from here on.
    pub fn close(&mut self) -> Result<(), CoordinatorError> {
        self.transition(SessionStatus::Active, SessionStatus::Closed)
    }

    /// `Closed → Published` with the computed results.
    pub fn publish(&mut self, results: TallyResult) -> Result<(), CoordinatorError> {
        self.transition(SessionStatus::Closed, SessionStatus::Published)?;
        self.results = Some(results);
        Ok(())
    }

    /// Count one committed vote.
    pub fn record_vote(&mut self, candidate: &CandidateId) {
        *self.tally.entry(candidate.clone()).or_insert(0) += 1;
    }

    fn transition(
        &mut self,
        from: SessionStatus,
        to: SessionStatus,
    ) -> Result<(), CoordinatorError> {
        if self.status != from {
            return Err(CoordinatorError::InvalidTransition {
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }
}
