use ballot_types::SessionStatus;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("invalid session transition: {from} -> {to}")]
    InvalidTransition {
        from: SessionStatus,
        to: SessionStatus,
    },

    #[error("results are not published")]
    ResultsNotPublished,

    /// A replication round begun before the session closed has not resolved
    /// yet; rolling over now could strand its outcome. Retry shortly.
    #[error("votes are still settling")]
    VotesSettling,

    #[error("roster error: {0}")]
    Roster(String),

    #[error("config error: {0}")]
    Config(String),
}
