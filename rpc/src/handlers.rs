//! Request handlers and their wire types.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::response::Response;
use axum::Json;
use ballot_coordinator::{CoordinatorEvent, StatusSnapshot, TallyResult, VotingSession};
use ballot_replication::ReplicaState;
use ballot_types::{CandidateId, Timestamp, VoteOutcome, VoterId};
use serde::{Deserialize, Serialize};

use crate::error::RpcError;
use crate::server::AppState;

// ── Vote ─────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct VoteSubmission {
    pub voter_id: u32,
    pub candidate: String,
    /// The client-side click time, milliseconds since the Unix epoch.
    pub click_time_ms: u64,
}

#[derive(Debug, Serialize)]
pub struct VoteResponse {
    pub outcome: VoteOutcome,
    pub accepted: bool,
    /// Whether a retry with backoff can possibly succeed.
    pub retryable: bool,
}

pub async fn submit_vote(
    State(state): State<AppState>,
    submission: Result<Json<VoteSubmission>, JsonRejection>,
) -> Result<Json<VoteResponse>, Response> {
    let Json(submission) = submission.map_err(crate::error::rejection_response)?;
    let outcome = state
        .coordinator
        .vote(
            VoterId::new(submission.voter_id),
            CandidateId::new(submission.candidate),
            Timestamp::new(submission.click_time_ms),
        )
        .await;
    Ok(Json(VoteResponse {
        accepted: outcome.is_accepted(),
        retryable: outcome.is_retryable(),
        outcome,
    }))
}

// ── Queries ──────────────────────────────────────────────────────────────

pub async fn status(State(state): State<AppState>) -> Json<StatusSnapshot> {
    Json(state.coordinator.status().await)
}

pub async fn tally(State(state): State<AppState>) -> Result<Json<TallyResult>, RpcError> {
    Ok(Json(state.coordinator.tally().await?))
}

#[derive(Serialize)]
pub struct ReplicasResponse {
    pub replicas: Vec<ReplicaState>,
}

pub async fn replicas(State(state): State<AppState>) -> Json<ReplicasResponse> {
    Json(ReplicasResponse {
        replicas: state.coordinator.replica_health().await,
    })
}

#[derive(Serialize)]
pub struct EventsResponse {
    pub events: Vec<CoordinatorEvent>,
}

pub async fn events(State(state): State<AppState>) -> Json<EventsResponse> {
    Json(EventsResponse {
        events: state.feed.recent(),
    })
}

#[derive(Serialize)]
pub struct HistoryResponse {
    pub sessions: Vec<VotingSession>,
}

pub async fn history(State(state): State<AppState>) -> Json<HistoryResponse> {
    Json(HistoryResponse {
        sessions: state.coordinator.session_history().await,
    })
}

// ── Admin ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct StartSessionRequest {
    /// Deadline in synchronized cluster time, milliseconds since the epoch.
    pub deadline_ms: u64,
}

pub async fn start_session(
    State(state): State<AppState>,
    Json(request): Json<StartSessionRequest>,
) -> Result<Json<StatusSnapshot>, RpcError> {
    state
        .coordinator
        .start_session(Timestamp::new(request.deadline_ms))
        .await?;
    Ok(Json(state.coordinator.status().await))
}

pub async fn stop_session(
    State(state): State<AppState>,
) -> Result<Json<StatusSnapshot>, RpcError> {
    state.coordinator.stop_session().await?;
    Ok(Json(state.coordinator.status().await))
}

pub async fn publish_results(
    State(state): State<AppState>,
) -> Result<Json<TallyResult>, RpcError> {
    Ok(Json(state.coordinator.publish_results().await?))
}

#[derive(Serialize)]
pub struct NewSessionResponse {
    pub session_id: u64,
}

pub async fn new_session(
    State(state): State<AppState>,
) -> Result<Json<NewSessionResponse>, RpcError> {
    let id = state.coordinator.new_session().await?;
    Ok(Json(NewSessionResponse {
        session_id: id.value(),
    }))
}
