//! The coordinator proper: authoritative state and the vote pipeline.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use ballot_admission::AdmissionQueue;
use ballot_clock::{BerkeleySync, LamportClock, SyncedClock};
use ballot_replication::{
    Operation, ReplicaSnapshot, ReplicaState, ReplicationError, ReplicationManager,
};
use ballot_types::{
    CandidateId, LamportStamp, SessionId, SessionStatus, Timestamp, VoteOutcome, VoteRequest,
    VoterId, VoterRecord,
};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::config::CoordinatorConfig;
use crate::events::{CoordinatorEvent, EventSink};
use crate::roster::Roster;
use crate::session::VotingSession;
use crate::tally::{self, TallyResult};
use crate::CoordinatorError;

/// Point-in-time view of the current session, for status queries.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub session_id: SessionId,
    pub status: SessionStatus,
    pub deadline: Option<Timestamp>,
    pub results_published: bool,
}

/// Everything behind the single exclusion domain: session status, the voter
/// registry, the tally and the duplicate-submission tracking all move
/// together, so admin transitions can never interleave with a commit.
struct CoordinatorState {
    session: VotingSession,
    voters: BTreeMap<VoterId, VoterRecord>,
    /// Order keys of votes currently between stamping and resolution,
    /// keyed by voter. Lower `(stamp, voter)` wins a duplicate race.
    in_flight: HashMap<VoterId, (LamportStamp, VoterId)>,
    /// Highest sequence whose outcome (commit or abort) is reflected in
    /// these records. Snapshots are taken at this mark, never at the
    /// manager's resolved counter, so a snapshot can never claim a sequence
    /// whose vote has not been recorded yet.
    resolved_sequence: u64,
    /// Archived sessions, oldest first.
    history: Vec<VotingSession>,
}

/// The vote coordinator.
pub struct Coordinator {
    lamport: Arc<LamportClock>,
    synced: Arc<SyncedClock>,
    pub(crate) berkeley: BerkeleySync,
    admission: AdmissionQueue,
    replication: ReplicationManager,
    roster: Roster,
    sinks: Vec<Box<dyn EventSink>>,
    state: Mutex<CoordinatorState>,
}

impl Coordinator {
    pub fn new(
        config: &CoordinatorConfig,
        roster: Roster,
        replication: ReplicationManager,
        sinks: Vec<Box<dyn EventSink>>,
    ) -> Result<Self, CoordinatorError> {
        roster.validate()?;
        let lamport = Arc::new(LamportClock::new());
        let admission = AdmissionQueue::new(
            config.max_concurrent_votes,
            config.admission_wait(),
            Arc::clone(&lamport),
        );
        let state = CoordinatorState {
            session: VotingSession::new(SessionId::FIRST, &roster.candidates),
            voters: roster.voter_records(),
            in_flight: HashMap::new(),
            resolved_sequence: 0,
            history: Vec::new(),
        };
        Ok(Self {
            lamport,
            synced: Arc::new(SyncedClock::new()),
            berkeley: BerkeleySync::new(config.sync_deviation_threshold_ms),
            admission,
            replication,
            roster,
            sinks,
            state: Mutex::new(state),
        })
    }

    // ── Vote pipeline ──────────────────────────────────────────────────

    /// Submit one vote.
    ///
    /// Ineligible requests are turned away before the admission gate; an
    /// admitted vote is stamped, checked against the deadline, raced
    /// against any duplicate in flight, and replicated to a quorum before
    /// the registry and tally change. The admission slot is released on
    /// every path.
    ///
    /// Processing runs detached from this future: a caller that goes away
    /// mid-vote (a dropped connection cancels its handler future) cannot
    /// strand the in-flight entry, the assigned sequence, or the admission
    /// slot. The vote settles either way.
    pub async fn vote(
        self: &Arc<Self>,
        voter: VoterId,
        candidate: CandidateId,
        click_time: Timestamp,
    ) -> VoteOutcome {
        if let Some(outcome) = self.pre_check(voter, &candidate).await {
            self.emit(&CoordinatorEvent::VoteRejected { voter, outcome });
            return outcome;
        }

        let permit = match self.admission.submit().await {
            Ok(permit) => permit,
            Err(err) => {
                tracing::debug!(%voter, %err, "vote not admitted");
                let outcome = VoteOutcome::SystemBusy;
                self.emit(&CoordinatorEvent::VoteRejected { voter, outcome });
                return outcome;
            }
        };
        self.emit(&CoordinatorEvent::VoteAdmitted {
            voter,
            stamp: permit.queued_at(),
        });

        let this = Arc::clone(self);
        let processing = tokio::spawn(async move {
            let (outcome, stamp) = this
                .process_admitted(voter, candidate.clone(), click_time)
                .await;
            match outcome {
                VoteOutcome::Accepted => this.emit(&CoordinatorEvent::VoteAccepted {
                    voter,
                    candidate,
                    stamp,
                }),
                outcome => this.emit(&CoordinatorEvent::VoteRejected { voter, outcome }),
            }
            drop(permit);
            outcome
        });
        match processing.await {
            Ok(outcome) => outcome,
            // The processing task is never aborted, so a join error is a panic.
            Err(err) => std::panic::resume_unwind(err.into_panic()),
        }
    }

    /// Cheap rejections that never consume an admission slot.
    async fn pre_check(&self, voter: VoterId, candidate: &CandidateId) -> Option<VoteOutcome> {
        if !self.roster.is_candidate(candidate) {
            return Some(VoteOutcome::UnknownCandidate);
        }
        let state = self.state.lock().await;
        if !state.session.status.accepts_votes() {
            return Some(VoteOutcome::VotingInactive);
        }
        match state.voters.get(&voter) {
            None => Some(VoteOutcome::UnknownVoter),
            Some(record) if record.has_voted => Some(VoteOutcome::AlreadyVoted),
            Some(_) => None,
        }
    }

    async fn process_admitted(
        &self,
        voter: VoterId,
        candidate: CandidateId,
        click_time: Timestamp,
    ) -> (VoteOutcome, LamportStamp) {
        let stamp;
        {
            let mut state = self.state.lock().await;
            // Stamped under the state lock so that registration order and
            // stamp order agree: the in-flight duplicate, if any, always
            // holds the lower (stamp, voter) key.
            stamp = self.lamport.tick();
            let request = VoteRequest {
                voter,
                candidate: candidate.clone(),
                client_click_time: click_time,
                arrival_stamp: stamp,
            };
            // Conditions may have changed while the request waited for a
            // slot; everything is re-checked under the lock.
            if !state.session.status.accepts_votes() {
                return (VoteOutcome::VotingInactive, stamp);
            }
            let Some(record) = state.voters.get(&voter) else {
                return (VoteOutcome::UnknownVoter, stamp);
            };
            if record.has_voted {
                return (VoteOutcome::AlreadyVoted, stamp);
            }
            // The click time is what counts, not the processing time: a
            // voter queued behind a backlog keeps their place, and a late
            // click never sneaks in while the backlog drains.
            if let Some(deadline) = state.session.deadline {
                if self.synced.correct(request.client_click_time).is_after(deadline) {
                    return (VoteOutcome::DeadlineExceeded, stamp);
                }
            }
            if let Some(existing) = state.in_flight.get(&voter) {
                if *existing <= request.order_key() {
                    tracing::debug!(%voter, %stamp, "duplicate submission lost the ordering race");
                    return (VoteOutcome::AlreadyVoted, stamp);
                }
            }
            state.in_flight.insert(voter, request.order_key());
        }

        let result = self
            .replication
            .propose(
                Operation::ApplyVote {
                    voter,
                    candidate: candidate.clone(),
                },
                stamp,
            )
            .await;

        let mut state = self.state.lock().await;
        state.in_flight.remove(&voter);
        match result {
            Ok(entry) => {
                state.resolved_sequence = state.resolved_sequence.max(entry.sequence);
                // The session may have closed while the entry replicated.
                // The closed tally is frozen, so the committed entry is
                // undone on the replicas instead of counted.
                if !state.session.status.accepts_votes() {
                    self.replication.rollback(entry.sequence).await;
                    tracing::info!(
                        %voter,
                        sequence = entry.sequence,
                        "vote resolved after session close, rolled back"
                    );
                    return (VoteOutcome::VotingInactive, stamp);
                }
                if let Some(record) = state.voters.get_mut(&voter) {
                    record.record_vote(candidate.clone());
                }
                state.session.record_vote(&candidate);
                tracing::debug!(%voter, sequence = entry.sequence, "vote committed");
                (VoteOutcome::Accepted, stamp)
            }
            Err(err) => {
                if let ReplicationError::QuorumNotReached { sequence, .. }
                | ReplicationError::MajorityUnreachable { sequence, .. } = &err
                {
                    state.resolved_sequence = state.resolved_sequence.max(*sequence);
                }
                tracing::warn!(%voter, %err, "replication failed, vote rolled back");
                (VoteOutcome::ReplicationFailed, stamp)
            }
        }
    }

    // ── Session lifecycle ──────────────────────────────────────────────

    /// `Pending → Active` with the given deadline (synchronized time).
    pub async fn start_session(&self, deadline: Timestamp) -> Result<(), CoordinatorError> {
        let id = {
            let mut state = self.state.lock().await;
            state.session.start(deadline)?;
            state.session.id
        };
        self.emit(&CoordinatorEvent::SessionStarted { id, deadline });
        Ok(())
    }

    /// `Active → Closed`; freezes the tally.
    pub async fn stop_session(&self) -> Result<(), CoordinatorError> {
        let id = {
            let mut state = self.state.lock().await;
            state.session.close()?;
            state.session.id
        };
        self.emit(&CoordinatorEvent::SessionClosed { id });
        Ok(())
    }

    /// `Closed → Published`: compute the winner over the frozen registry.
    pub async fn publish_results(&self) -> Result<TallyResult, CoordinatorError> {
        let (id, results) = {
            let mut state = self.state.lock().await;
            let results = tally::compute(state.voters.values(), &self.roster.candidates);
            state.session.publish(results.clone())?;
            (state.session.id, results)
        };
        self.emit(&CoordinatorEvent::ResultsPublished { id });
        Ok(results)
    }

    /// Archive the current session and open a fresh pending one.
    ///
    /// Every voter record resets and the replicas are resynced to an empty
    /// vote set; sequence numbers keep counting across sessions.
    pub async fn new_session(&self) -> Result<SessionId, CoordinatorError> {
        let (from, to, mark) = {
            let mut state = self.state.lock().await;
            if state.session.status == SessionStatus::Active {
                return Err(CoordinatorError::InvalidTransition {
                    from: SessionStatus::Active,
                    to: SessionStatus::Pending,
                });
            }
            // A vote that was mid-replication when the session closed has
            // not settled until its in-flight entry clears; rolling over
            // underneath it would race the replica resync.
            if !state.in_flight.is_empty() {
                return Err(CoordinatorError::VotesSettling);
            }
            let from = state.session.id;
            let to = from.next();
            let archived = std::mem::replace(
                &mut state.session,
                VotingSession::new(to, &self.roster.candidates),
            );
            state.history.push(archived);
            state.voters = self.roster.voter_records();
            (from, to, state.resolved_sequence)
        };

        let snapshot = ReplicaSnapshot::new(mark, HashMap::new());
        self.replication.resync_all(snapshot).await;
        self.emit(&CoordinatorEvent::SessionRolledOver { from, to });
        Ok(to)
    }

    // ── Queries ────────────────────────────────────────────────────────

    pub async fn status(&self) -> StatusSnapshot {
        let state = self.state.lock().await;
        StatusSnapshot {
            session_id: state.session.id,
            status: state.session.status,
            deadline: state.session.deadline,
            results_published: state.session.status == SessionStatus::Published,
        }
    }

    /// Final results; only available once published.
    pub async fn tally(&self) -> Result<TallyResult, CoordinatorError> {
        let state = self.state.lock().await;
        state
            .session
            .results
            .clone()
            .ok_or(CoordinatorError::ResultsNotPublished)
    }

    pub async fn replica_health(&self) -> Vec<ReplicaState> {
        self.replication.replica_states().await
    }

    /// Poll every replica and resync any that lag the committed state.
    pub async fn run_health_check(&self) -> Vec<ReplicaState> {
        let snapshot = self.current_snapshot().await;
        self.replication.health_check_all(snapshot).await
    }

    /// Archived sessions, oldest first.
    pub async fn session_history(&self) -> Vec<VotingSession> {
        self.state.lock().await.history.clone()
    }

    // ── Plumbing ───────────────────────────────────────────────────────

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn lamport_clock(&self) -> &Arc<LamportClock> {
        &self.lamport
    }

    pub fn synced_clock(&self) -> &Arc<SyncedClock> {
        &self.synced
    }

    pub fn replication(&self) -> &ReplicationManager {
        &self.replication
    }

    pub(crate) fn emit(&self, event: &CoordinatorEvent) {
        for sink in &self.sinks {
            sink.publish(event);
        }
    }

    /// Committed votes as a full snapshot, for replica resync.
    ///
    /// The sequence mark and the vote set come from the same lock
    /// acquisition, so the snapshot never claims a sequence whose vote it
    /// does not carry.
    async fn current_snapshot(&self) -> ReplicaSnapshot {
        let state = self.state.lock().await;
        let votes = state
            .voters
            .values()
            .filter(|r| r.has_voted)
            .filter_map(|r| r.chosen_candidate.clone().map(|c| (r.id, c)))
            .collect();
        ReplicaSnapshot::new(state.resolved_sequence, votes)
    }
}

/// Drive [`Coordinator::run_health_check`] on a fixed period, forever.
///
/// Without this loop a replica excluded after repeated failures would stay
/// excluded for the life of the process; the periodic pass restores it and
/// resyncs whatever it missed.
pub async fn run_health_checks(coordinator: Arc<Coordinator>, period: Duration) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        interval.tick().await;
        coordinator.run_health_check().await;
    }
}
