//! Stage B: per-seed gossip collection, §4.6.

use super::probe::ProbeTask;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use ingestor_rpc::PeerClient;
use ingestor_sql::Id;
use std::collections::HashSet;
use tracing::warn;

/// Everything one seed contributed to this cycle: rows written, the set of
/// peers it observed, how many of those were already in backoff, and the
/// probe candidates it produced (pre-dedup).
#[derive(Debug, Clone)]
pub struct SeedOutcome {
    pub seed_base_url: String,
    pub gossip_written: i32,
    pub observed: HashSet<Id>,
    pub backoff_count: i32,
    pub candidates: Vec<ProbeTask>,
    pub backoff_ids: HashSet<Id>,
}

impl SeedOutcome {
    fn empty(seed_base_url: String) -> Self {
        Self {
            seed_base_url,
            gossip_written: 0,
            observed: HashSet::new(),
            backoff_count: 0,
            candidates: Vec::new(),
            backoff_ids: HashSet::new(),
        }
    }
}

/// Polls every configured seed concurrently, bounded to `fanout` in flight
/// at once. A seed whose `getPods` call fails contributes an empty
/// [`SeedOutcome`] and the cycle continues. Results preserve `seeds`' input
/// order (`buffered`, not `buffer_unordered`) since Stage C's dedup winner is
/// decided by seed iteration order, not completion order.
pub async fn fan_out(
    seeds: &[url::Url],
    fanout: usize,
    rpc: &PeerClient,
    db: &sqlx::PgPool,
    cycle_start: DateTime<Utc>,
    probe_port: u16,
) -> Vec<SeedOutcome> {
    stream::iter(seeds.iter().cloned())
        .map(|seed| {
            let rpc = rpc.clone();
            async move {
                process_seed(seed.as_str().trim_end_matches('/'), &rpc, db, cycle_start, probe_port).await
            }
        })
        .buffered(fanout.max(1))
        .collect()
        .await
}

async fn process_seed(
    seed_base_url: &str,
    rpc: &PeerClient,
    db: &sqlx::PgPool,
    cycle_start: DateTime<Utc>,
    probe_port: u16,
) -> SeedOutcome {
    let pods = match rpc.get_pods(seed_base_url).await {
        Ok(pods) => pods,
        Err(err) => {
            warn!(seed = seed_base_url, error = %err, "gossip call failed; seed contributes nothing this cycle");
            return SeedOutcome::empty(seed_base_url.to_string());
        }
    };

    let outcomes = futures::future::join_all(
        pods.into_iter()
            .filter(|pod| pod.pubkey.is_some())
            .map(|pod| process_pod(seed_base_url, pod, db, cycle_start, probe_port)),
    )
    .await;

    let mut result = SeedOutcome::empty(seed_base_url.to_string());
    for outcome in outcomes.into_iter().flatten() {
        result.gossip_written += 1;
        result.observed.insert(outcome.pnode_id);
        if outcome.in_backoff {
            result.backoff_count += 1;
            result.backoff_ids.insert(outcome.pnode_id);
        } else if let Some(candidate) = outcome.candidate {
            result.candidates.push(candidate);
        }
    }
    result
}

struct PodOutcome {
    pnode_id: Id,
    in_backoff: bool,
    candidate: Option<ProbeTask>,
}

async fn process_pod(
    seed_base_url: &str,
    pod: ingestor_rpc::PodInfo,
    db: &sqlx::PgPool,
    cycle_start: DateTime<Utc>,
    probe_port: u16,
) -> Option<PodOutcome> {
    let pubkey = pod.pubkey.as_deref()?;

    let backoff = match ingestor_sql::peers::upsert_peer(pubkey, pod.is_public.unwrap_or(false), db).await
    {
        Ok(state) => state,
        Err(err) => {
            warn!(seed = seed_base_url, pubkey, error = %err, "peer upsert failed");
            return None;
        }
    };

    let observation = ingestor_sql::gossip::NewObservation {
        pnode_id: backoff.id,
        seed_base_url,
        observed_at: cycle_start,
        address: &pod.address,
        version: pod.version.as_deref(),
        last_seen_timestamp: pod.last_seen_timestamp,
        storage_committed: pod.storage_committed,
        storage_used: pod.storage_used,
        storage_usage_percent: pod.storage_usage_percent,
        is_public: pod.is_public,
    };
    if let Err(err) = ingestor_sql::gossip::insert(observation, db).await {
        warn!(seed = seed_base_url, pubkey, error = %err, "gossip observation insert failed");
        return None;
    }

    let mut failure_count_at_decision = backoff.failure_count;
    let in_backoff = match backoff.next_stats_allowed_at {
        Some(next) if next > cycle_start => true,
        _ => {
            if backoff.failure_count > 0 {
                if let Err(err) = ingestor_sql::peers::clear_backoff(backoff.id, db).await {
                    warn!(pubkey, error = %err, "delayed backoff clear failed");
                } else {
                    failure_count_at_decision = 0;
                }
            }
            false
        }
    };

    let candidate = if in_backoff {
        None
    } else {
        Some(ProbeTask {
            pnode_id: backoff.id,
            seed_base_url: seed_base_url.to_string(),
            probe_base_url: super::probe_base_url(&pod.address, probe_port),
            failure_count_at_decision,
        })
    };

    Some(PodOutcome {
        pnode_id: backoff.id,
        in_backoff,
        candidate,
    })
}
