//! Berkeley averaging round — the pure computation half of clock sync.
//!
//! The coordinator polls every peer for its wall-clock reading under a
//! per-call timeout; unreachable peers show up here as `None` and are simply
//! excluded until the next round. Readings further than the configured
//! deviation threshold from the median are treated as outliers and excluded
//! from the average, but still receive a corrective delta.

/// Default deviation threshold: readings more than 10 s from the mean are outliers.
pub const DEFAULT_DEVIATION_THRESHOLD_MS: u64 = 10_000;

/// The corrective deltas produced by one averaging round.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoundPlan {
    /// Delta for the coordinator's own clock.
    pub local_delta_ms: i64,
    /// Per-peer deltas, index-aligned with the input readings.
    /// `None` where the peer was unreachable this round.
    pub peer_deltas_ms: Vec<Option<i64>>,
    /// The agreed time the round converged on.
    pub agreed_ms: i64,
    /// How many readings survived outlier exclusion.
    pub participants: usize,
}

/// Berkeley-style clock averaging.
#[derive(Clone, Debug)]
pub struct BerkeleySync {
    deviation_threshold_ms: u64,
}

impl BerkeleySync {
    pub fn new(deviation_threshold_ms: u64) -> Self {
        Self {
            deviation_threshold_ms,
        }
    }

    /// Compute one averaging round.
    ///
    /// `local_ms` is the coordinator's corrected reading; `peer_readings_ms`
    /// holds each peer's corrected reading, `None` for peers that failed the
    /// reachability timeout. Returns `None` when no peer responded — there is
    /// nothing to agree on, and the next round will retry.
    pub fn plan_round(&self, local_ms: i64, peer_readings_ms: &[Option<i64>]) -> Option<RoundPlan> {
        let reachable: Vec<i64> = peer_readings_ms.iter().flatten().copied().collect();
        if reachable.is_empty() {
            tracing::warn!("clock sync round skipped: no reachable peers");
            return None;
        }

        let mut all = Vec::with_capacity(reachable.len() + 1);
        all.push(local_ms);
        all.extend_from_slice(&reachable);

        // Outliers are measured against the median, not the mean; a single
        // wildly wrong clock must not drag the reference point with it.
        let reference = median(&all);
        let survivors: Vec<i64> = all
            .iter()
            .copied()
            .filter(|r| r.abs_diff(reference) <= self.deviation_threshold_ms)
            .collect();

        // Degenerate case: an even-sized bimodal set can leave the averaged
        // median far from every reading. Fall back to the full set rather
        // than skip the round.
        let agreed = if survivors.is_empty() {
            mean(&all)
        } else {
            mean(&survivors)
        };
        let participants = if survivors.is_empty() {
            all.len()
        } else {
            survivors.len()
        };

        let peer_deltas_ms = peer_readings_ms
            .iter()
            .map(|r| r.map(|reading| agreed - reading))
            .collect();

        Some(RoundPlan {
            local_delta_ms: agreed - local_ms,
            peer_deltas_ms,
            agreed_ms: agreed,
            participants,
        })
    }
}

impl Default for BerkeleySync {
    fn default() -> Self {
        Self::new(DEFAULT_DEVIATION_THRESHOLD_MS)
    }
}

fn mean(readings: &[i64]) -> i64 {
    debug_assert!(!readings.is_empty());
    let sum: i128 = readings.iter().map(|&r| r as i128).sum();
    (sum / readings.len() as i128) as i64
}

fn median(readings: &[i64]) -> i64 {
    debug_assert!(!readings.is_empty());
    let mut sorted = readings.to_vec();
    sorted.sort_unstable();
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        ((sorted[mid - 1] as i128 + sorted[mid] as i128) / 2) as i64
    } else {
        sorted[mid]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_averages_reachable_readings() {
        let sync = BerkeleySync::new(10_000);
        let plan = sync
            .plan_round(1_000, &[Some(1_300), Some(700)])
            .expect("peers reachable");

        assert_eq!(plan.agreed_ms, 1_000);
        assert_eq!(plan.local_delta_ms, 0);
        assert_eq!(plan.peer_deltas_ms, vec![Some(-300), Some(300)]);
        assert_eq!(plan.participants, 3);
    }

    #[test]
    fn unreachable_peers_are_excluded_but_keep_their_slot() {
        let sync = BerkeleySync::new(10_000);
        let plan = sync
            .plan_round(2_000, &[None, Some(2_400), None])
            .expect("one peer reachable");

        assert_eq!(plan.agreed_ms, 2_200);
        assert_eq!(plan.local_delta_ms, 200);
        assert_eq!(plan.peer_deltas_ms, vec![None, Some(-200), None]);
        assert_eq!(plan.participants, 2);
    }

    #[test]
    fn no_reachable_peers_skips_the_round() {
        let sync = BerkeleySync::new(10_000);
        assert_eq!(sync.plan_round(1_000, &[None, None]), None);
        assert_eq!(sync.plan_round(1_000, &[]), None);
    }

    #[test]
    fn outliers_are_excluded_from_the_average() {
        let sync = BerkeleySync::new(1_000);
        // One peer is wildly off (an hour ahead); it must not drag the average.
        let plan = sync
            .plan_round(10_000, &[Some(10_200), Some(3_610_000)])
            .expect("peers reachable");

        assert_eq!(plan.agreed_ms, 10_100);
        assert_eq!(plan.participants, 2);
        // The outlier still receives a (large) corrective delta.
        assert_eq!(plan.peer_deltas_ms[1], Some(10_100 - 3_610_000));
    }

    #[test]
    fn applying_deltas_makes_all_clocks_agree() {
        let sync = BerkeleySync::new(10_000);
        let local = 5_000;
        let peers = [Some(5_600), Some(4_700), Some(5_150)];
        let plan = sync.plan_round(local, &peers).expect("peers reachable");

        assert_eq!(local + plan.local_delta_ms, plan.agreed_ms);
        for (reading, delta) in peers.iter().zip(&plan.peer_deltas_ms) {
            assert_eq!(reading.unwrap() + delta.unwrap(), plan.agreed_ms);
        }
    }
}
