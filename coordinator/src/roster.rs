//! Static voter roster and candidate list, seeded at startup.

use ballot_types::{CandidateId, VoterId, VoterRecord};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::CoordinatorError;

/// One voter in the roster file.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RosterEntry {
    pub id: u32,
    pub name: String,
}

/// The static roster: who may vote, and for whom.
///
/// Loaded once at startup; the coordinator never mutates it. Votes naming a
/// voter or candidate outside the roster are rejected without admission.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Roster {
    pub voters: Vec<RosterEntry>,
    pub candidates: Vec<CandidateId>,
}

impl Roster {
    /// The built-in demo roster: ten voters, ten candidates.
    pub fn demo() -> Self {
        let names = [
            "Alice", "Bob", "Charlie", "Diana", "Eve", "Frank", "Grace", "Henry", "Ivy", "Jack",
        ];
        Self {
            voters: names
                .iter()
                .enumerate()
                .map(|(i, name)| RosterEntry {
                    id: i as u32 + 1,
                    name: (*name).to_string(),
                })
                .collect(),
            candidates: ('A'..='J')
                .map(|letter| CandidateId::new(format!("Candidate {letter}")))
                .collect(),
        }
    }

    /// Load a roster from a TOML file.
    pub fn from_toml_file(path: &str) -> Result<Self, CoordinatorError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| CoordinatorError::Roster(e.to_string()))?;
        Self::from_toml_str(&content)
    }

    /// Parse a roster from a TOML string and validate it.
    pub fn from_toml_str(s: &str) -> Result<Self, CoordinatorError> {
        let roster: Roster =
            toml::from_str(s).map_err(|e| CoordinatorError::Roster(e.to_string()))?;
        roster.validate()?;
        Ok(roster)
    }

    /// Reject empty or duplicate-bearing rosters.
    pub fn validate(&self) -> Result<(), CoordinatorError> {
        if self.voters.is_empty() {
            return Err(CoordinatorError::Roster("roster has no voters".into()));
        }
        if self.candidates.is_empty() {
            return Err(CoordinatorError::Roster("roster has no candidates".into()));
        }
        let mut ids = std::collections::HashSet::new();
        for voter in &self.voters {
            if !ids.insert(voter.id) {
                return Err(CoordinatorError::Roster(format!(
                    "duplicate voter id {}",
                    voter.id
                )));
            }
        }
        let unique: std::collections::HashSet<_> = self.candidates.iter().collect();
        if unique.len() != self.candidates.len() {
            return Err(CoordinatorError::Roster("duplicate candidate".into()));
        }
        Ok(())
    }

    /// Fresh voter records for a new session, keyed by id.
    pub fn voter_records(&self) -> BTreeMap<VoterId, VoterRecord> {
        self.voters
            .iter()
            .map(|v| {
                let id = VoterId::new(v.id);
                (id, VoterRecord::new(id, v.name.clone()))
            })
            .collect()
    }

    pub fn is_candidate(&self, candidate: &CandidateId) -> bool {
        self.candidates.contains(candidate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_roster_is_valid() {
        let roster = Roster::demo();
        assert!(roster.validate().is_ok());
        assert_eq!(roster.voters.len(), 10);
        assert_eq!(roster.candidates.len(), 10);
        assert!(roster.is_candidate(&CandidateId::new("Candidate A")));
        assert!(!roster.is_candidate(&CandidateId::new("Candidate Z")));
    }

    #[test]
    fn voter_records_start_unvoted() {
        let records = Roster::demo().voter_records();
        assert_eq!(records.len(), 10);
        assert!(records.values().all(|r| !r.has_voted));
        assert_eq!(records[&VoterId::new(1)].name, "Alice");
    }

    #[test]
    fn parses_a_roster_file() {
        let toml = r#"
            candidates = ["Candidate A", "Candidate B"]

            [[voters]]
            id = 1
            name = "Alice"

            [[voters]]
            id = 2
            name = "Bob"
        "#;
        let roster = Roster::from_toml_str(toml).expect("should parse");
        assert_eq!(roster.voters.len(), 2);
        assert_eq!(roster.candidates.len(), 2);
    }

    #[test]
    fn duplicate_voter_id_is_rejected() {
        let toml = r#"
            candidates = ["Candidate A"]

            [[voters]]
            id = 1
            name = "Alice"

            [[voters]]
            id = 1
            name = "Bob"
        "#;
        assert!(matches!(
            Roster::from_toml_str(toml),
            Err(CoordinatorError::Roster(_))
        ));
    }

    #[test]
    fn empty_roster_is_rejected() {
        let roster = Roster {
            voters: Vec::new(),
            candidates: vec![CandidateId::new("Candidate A")],
        };
        assert!(roster.validate().is_err());
    }
}
