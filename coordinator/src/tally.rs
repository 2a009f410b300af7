//! Tally computation over a frozen voter set.

use ballot_types::{CandidateId, VoterRecord};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Who won, if anyone.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TallyOutcome {
    /// One candidate holds strictly the highest count.
    Winner(CandidateId),
    /// Multiple candidates share the highest count; reported explicitly,
    /// never broken arbitrarily.
    Tie(Vec<CandidateId>),
    /// No committed votes at all.
    NoVotes,
}

/// Final results for a published session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TallyResult {
    pub counts: BTreeMap<CandidateId, u64>,
    pub outcome: TallyOutcome,
}

/// Aggregate the frozen voter records into per-candidate counts.
///
/// Pure and idempotent: the same input always yields the same result. The
/// counts are zero-filled over the full ballot so absent candidates show
/// explicitly as zero.
pub fn compute<'a>(
    records: impl IntoIterator<Item = &'a VoterRecord>,
    candidates: &[CandidateId],
) -> TallyResult {
    let mut counts: BTreeMap<CandidateId, u64> =
        candidates.iter().map(|c| (c.clone(), 0)).collect();
    for record in records {
        if let Some(candidate) = record.chosen_candidate.as_ref().filter(|_| record.has_voted) {
            *counts.entry(candidate.clone()).or_insert(0) += 1;
        }
    }

    let top = counts.values().copied().max().unwrap_or(0);
    let outcome = if top == 0 {
        TallyOutcome::NoVotes
    } else {
        // BTreeMap iteration keeps tied candidates in a stable order.
        let leaders: Vec<CandidateId> = counts
            .iter()
            .filter(|(_, &n)| n == top)
            .map(|(c, _)| c.clone())
            .collect();
        match leaders.as_slice() {
            [single] => TallyOutcome::Winner(single.clone()),
            _ => TallyOutcome::Tie(leaders),
        }
    };

    TallyResult { counts, outcome }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ballot_types::VoterId;

    fn ballot() -> Vec<CandidateId> {
        vec![
            CandidateId::new("Candidate A"),
            CandidateId::new("Candidate B"),
            CandidateId::new("Candidate C"),
        ]
    }

    fn voted(id: u32, candidate: &str) -> VoterRecord {
        let mut record = VoterRecord::new(VoterId::new(id), format!("voter-{id}"));
        record.record_vote(CandidateId::new(candidate));
        record
    }

    #[test]
    fn single_winner() {
        let records = vec![
            voted(1, "Candidate A"),
            voted(2, "Candidate A"),
            voted(3, "Candidate B"),
        ];
        let result = compute(&records, &ballot());
        assert_eq!(result.counts[&CandidateId::new("Candidate A")], 2);
        assert_eq!(result.counts[&CandidateId::new("Candidate C")], 0);
        assert_eq!(
            result.outcome,
            TallyOutcome::Winner(CandidateId::new("Candidate A"))
        );
    }

    #[test]
    fn tie_is_reported_explicitly() {
        let records = vec![voted(1, "Candidate A"), voted(2, "Candidate B")];
        let result = compute(&records, &ballot());
        assert_eq!(
            result.outcome,
            TallyOutcome::Tie(vec![
                CandidateId::new("Candidate A"),
                CandidateId::new("Candidate B"),
            ])
        );
    }

    #[test]
    fn no_votes() {
        let records = vec![VoterRecord::new(VoterId::new(1), "Alice")];
        let result = compute(&records, &ballot());
        assert_eq!(result.outcome, TallyOutcome::NoVotes);
        assert!(result.counts.values().all(|&n| n == 0));
    }

    #[test]
    fn compute_is_idempotent() {
        let records = vec![voted(1, "Candidate A"), voted(2, "Candidate B")];
        let first = compute(&records, &ballot());
        let second = compute(&records, &ballot());
        assert_eq!(first, second);
    }
}
