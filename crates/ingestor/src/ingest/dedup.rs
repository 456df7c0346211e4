//! Stage C: probe deduplication. Across every seed's candidates, the first
//! task seen for a given peer is the one actually probed — the "dedup
//! winner" of spec §9. Seed iteration order, not wall-clock arrival, decides
//! "first", so the outcome is deterministic given a fixed seed list.

use super::gossip::SeedOutcome;
use super::probe::ProbeTask;
use ingestor_sql::Id;
use std::collections::HashSet;

pub fn dedup(seed_outcomes: &[SeedOutcome]) -> (Vec<ProbeTask>, HashSet<Id>, HashSet<Id>) {
    let mut seen = HashSet::new();
    let mut winners = Vec::new();
    let mut global_backoff = HashSet::new();
    let mut global_observed = HashSet::new();

    for outcome in seed_outcomes {
        global_backoff.extend(outcome.backoff_ids.iter().copied());
        global_observed.extend(outcome.observed.iter().copied());

        for candidate in &outcome.candidates {
            if seen.insert(candidate.pnode_id) {
                winners.push(candidate.clone());
            }
        }
    }

    (winners, global_backoff, global_observed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::probe::ProbeTask;

    fn task(pnode_id: Id, seed: &str) -> ProbeTask {
        ProbeTask {
            pnode_id,
            seed_base_url: seed.to_string(),
            probe_base_url: format!("http://probe/{pnode_id}"),
            failure_count_at_decision: 0,
        }
    }

    fn outcome(seed: &str, observed: &[Id], backoff: &[Id], candidates: Vec<ProbeTask>) -> SeedOutcome {
        SeedOutcome {
            seed_base_url: seed.to_string(),
            gossip_written: observed.len() as i32,
            observed: observed.iter().copied().collect(),
            backoff_count: backoff.len() as i32,
            candidates,
            backoff_ids: backoff.iter().copied().collect(),
        }
    }

    #[test]
    fn first_seed_in_iteration_order_wins() {
        let outcomes = vec![
            outcome("seed-a", &[1], &[], vec![task(1, "seed-a")]),
            outcome("seed-b", &[1], &[], vec![task(1, "seed-b")]),
        ];

        let (winners, _, observed) = dedup(&outcomes);

        assert_eq!(winners.len(), 1);
        assert_eq!(winners[0].seed_base_url, "seed-a");
        assert_eq!(observed.len(), 1);
    }

    #[test]
    fn backoff_and_observed_sets_union_across_seeds() {
        let outcomes = vec![
            outcome("seed-a", &[1, 2], &[2], vec![task(1, "seed-a")]),
            outcome("seed-b", &[2, 3], &[2], vec![task(3, "seed-b")]),
        ];

        let (winners, global_backoff, global_observed) = dedup(&outcomes);

        assert_eq!(winners.len(), 2, "peers 1 and 3 each have exactly one candidate");
        assert_eq!(global_backoff.len(), 1, "peer 2's backoff is one entry, not two");
        assert_eq!(global_observed.len(), 3, "peers 1, 2, 3 were each observed by some seed");
    }

    #[test]
    fn no_candidates_yields_no_winners() {
        let outcomes = vec![outcome("seed-a", &[1], &[1], Vec::new())];

        let (winners, global_backoff, _) = dedup(&outcomes);

        assert!(winners.is_empty());
        assert_eq!(global_backoff.len(), 1);
    }
}
