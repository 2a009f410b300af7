//! Candidate identifier.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a candidate on the ballot.
///
/// Candidates come from a static list seeded at startup; the coordinator
/// rejects votes naming anything else. `Ord` is derived so tied candidates
/// can be reported in a stable order.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CandidateId(String);

impl CandidateId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CandidateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
