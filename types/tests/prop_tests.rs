use proptest::prelude::*;

use ballot_types::{CandidateId, LamportStamp, Timestamp, VoteRequest, VoterId};

fn request(stamp: u64, voter: u32, click: u64) -> VoteRequest {
    VoteRequest {
        voter: VoterId::new(voter),
        candidate: CandidateId::new("Candidate A"),
        client_click_time: Timestamp::new(click),
        arrival_stamp: LamportStamp::new(stamp),
    }
}

proptest! {
    /// Lamport stamp ordering matches the underlying integers.
    #[test]
    fn lamport_ordering(a in 0u64..u64::MAX, b in 0u64..u64::MAX) {
        let sa = LamportStamp::new(a);
        let sb = LamportStamp::new(b);
        prop_assert_eq!(sa < sb, a < b);
        prop_assert_eq!(sa == sb, a == b);
    }

    /// The max-fold rule always produces a stamp strictly greater than both inputs.
    #[test]
    fn fold_strictly_advances(local in 0u64..u64::MAX / 2, remote in 0u64..u64::MAX / 2) {
        let folded = LamportStamp::new(local).folded_with(LamportStamp::new(remote));
        prop_assert!(folded > LamportStamp::new(local));
        prop_assert!(folded > LamportStamp::new(remote));
    }

    /// The `(stamp, voter)` conflict-resolution key is a total order: the
    /// stamp dominates, and voter id breaks exact stamp ties.
    #[test]
    fn order_key_total_order(
        stamp_a in 0u64..1000, voter_a in 1u32..100,
        stamp_b in 0u64..1000, voter_b in 1u32..100,
    ) {
        let a = request(stamp_a, voter_a, 0);
        let b = request(stamp_b, voter_b, 0);
        if stamp_a != stamp_b {
            prop_assert_eq!(a.order_key() < b.order_key(), stamp_a < stamp_b);
        } else {
            prop_assert_eq!(a.order_key() < b.order_key(), voter_a < voter_b);
        }
    }

    /// Timestamp ordering matches the underlying milliseconds, and
    /// `is_after` agrees with strict ordering.
    #[test]
    fn timestamp_ordering(a in 0u64..u64::MAX, b in 0u64..u64::MAX) {
        let ta = Timestamp::new(a);
        let tb = Timestamp::new(b);
        prop_assert_eq!(ta <= tb, a <= b);
        prop_assert_eq!(ta.is_after(tb), a > b);
    }

    /// Offsetting by a delta and back is lossless when nothing saturates.
    #[test]
    fn offset_roundtrip(ms in 1_000_000u64..u64::MAX / 2, delta in -1_000_000i64..1_000_000) {
        let ts = Timestamp::new(ms);
        prop_assert_eq!(ts.offset_by(delta).offset_by(-delta), ts);
    }

    /// VoteRequest survives a serde round trip unchanged.
    #[test]
    fn vote_request_serde_roundtrip(stamp in 0u64..u64::MAX, voter in 0u32..u32::MAX, click in 0u64..u64::MAX) {
        let req = request(stamp, voter, click);
        let json = serde_json::to_string(&req).unwrap();
        let back: VoteRequest = serde_json::from_str(&json).unwrap();
        prop_assert_eq!(back, req);
    }
}
