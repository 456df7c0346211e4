//! C6: the ingestion cycle, the central algorithm. One call to [`run`]
//! performs Stage A through Stage E described in spec §4.6: backoff hygiene,
//! gossip fan-out, probe deduplication, bounded-batch stats probing, and
//! summary bookkeeping.

mod dedup;
mod gossip;
mod probe;

use crate::error::IngestError;
use chrono::Utc;
use ingestor_rpc::PeerClient;
use ingestor_sql::Id;
use std::collections::HashSet;
use tracing::{info, warn};

pub use gossip::SeedOutcome;
pub use probe::ProbeTask;

/// Cycle-wide tunables the scheduler threads through; kept distinct from
/// `crate::config::Args` so this module has no clap dependency of its own.
#[derive(Clone)]
pub struct CycleConfig {
    pub seeds: Vec<url::Url>,
    pub seed_fanout: usize,
    pub probe_batch_size: usize,
    pub probe_port: u16,
}

#[derive(Debug, Default, Clone)]
pub struct CycleSummary {
    pub total_pods: i32,
    pub gossip_obs: i32,
    pub stats_attempts: i32,
    pub stats_success: i32,
    pub stats_failure: i32,
    pub backoff_count: i32,
    pub observed: i32,
    pub per_seed: Vec<SeedSummary>,
}

#[derive(Debug, Clone)]
pub struct SeedSummary {
    pub seed_base_url: String,
    pub attempted: i32,
    pub backoff: i32,
    pub success: i32,
    pub failed: i32,
    pub observed: i32,
}

/// Runs one full cycle and persists its `IngestionRun` row. Per-seed and
/// per-peer failures never escape this function; only a failure to open or
/// finalize the run row does, since that leaves the store in an ambiguous
/// state the caller (the scheduler's circuit breaker) needs to know about.
#[tracing::instrument(skip_all)]
pub async fn run(
    config: &CycleConfig,
    rpc: &PeerClient,
    db: &sqlx::PgPool,
) -> Result<CycleSummary, IngestError> {
    let cycle_start = Utc::now();

    let reset = ingestor_sql::peers::reset_expired_backoff(cycle_start, db)
        .await
        .map_err(IngestError::Store)?;
    if reset > 0 {
        info!(reset, "stage A: backoff hygiene reset stale failures");
    }

    let run_id = ingestor_sql::runs::insert(cycle_start, db)
        .await
        .map_err(IngestError::OpenRun)?;

    let seed_outcomes = gossip::fan_out(
        &config.seeds,
        config.seed_fanout,
        rpc,
        db,
        cycle_start,
        config.probe_port,
    )
    .await;

    let (winners, global_backoff, global_observed) = dedup::dedup(&seed_outcomes);

    let probe_results = probe::run_batches(
        &winners,
        config.probe_batch_size,
        rpc,
        db,
        cycle_start,
    )
    .await;

    let summary = summarize(&seed_outcomes, &winners, &probe_results, &global_backoff, &global_observed);

    ingestor_sql::runs::finish(
        run_id,
        ingestor_sql::runs::RunSummary {
            finished_at: Utc::now(),
            attempted: summary.stats_attempts,
            success: summary.stats_success,
            failed: summary.stats_failure,
            backoff: summary.backoff_count,
            observed: summary.observed,
        },
        db,
    )
    .await
    .map_err(|source| IngestError::FinishRun { run_id, source })?;

    let seed_rows: Vec<ingestor_sql::runs::SeedStats<'_>> = summary
        .per_seed
        .iter()
        .map(|s| ingestor_sql::runs::SeedStats {
            seed_base_url: &s.seed_base_url,
            attempted: s.attempted,
            backoff: s.backoff,
            success: s.success,
            failed: s.failed,
            observed: s.observed,
        })
        .collect();
    if let Err(err) = ingestor_sql::runs::insert_seed_stats(run_id, &seed_rows, db).await {
        warn!(error = %err, run_id, "failed to persist per-seed stats for this run");
    }

    if let Err(err) = crate::snapshot::compute_and_store(run_id, &config.seeds, db).await {
        warn!(error = %err, run_id, "snapshot computation failed; run row is still finalized");
    }

    Ok(summary)
}

fn summarize(
    seed_outcomes: &[SeedOutcome],
    winners: &[ProbeTask],
    probe_results: &[probe::TaskOutcome],
    global_backoff: &HashSet<Id>,
    global_observed: &HashSet<Id>,
) -> CycleSummary {
    let total_pods: i32 = seed_outcomes.iter().map(|s| s.gossip_written).sum();

    let mut per_seed_success = std::collections::HashMap::<String, i32>::new();
    let mut per_seed_failed = std::collections::HashMap::<String, i32>::new();
    for result in probe_results {
        let entry = if result.success {
            &mut per_seed_success
        } else {
            &mut per_seed_failed
        };
        *entry.entry(result.seed_base_url.clone()).or_default() += 1;
    }

    let mut per_seed_attempted = std::collections::HashMap::<String, i32>::new();
    for winner in winners {
        *per_seed_attempted
            .entry(winner.seed_base_url.clone())
            .or_default() += 1;
    }

    let per_seed = seed_outcomes
        .iter()
        .map(|s| SeedSummary {
            seed_base_url: s.seed_base_url.clone(),
            attempted: *per_seed_attempted.get(&s.seed_base_url).unwrap_or(&0),
            backoff: s.backoff_count,
            success: *per_seed_success.get(&s.seed_base_url).unwrap_or(&0),
            failed: *per_seed_failed.get(&s.seed_base_url).unwrap_or(&0),
            observed: s.observed.len() as i32,
        })
        .collect();

    CycleSummary {
        total_pods,
        gossip_obs: total_pods,
        stats_attempts: winners.len() as i32,
        stats_success: probe_results.iter().filter(|r| r.success).count() as i32,
        stats_failure: probe_results.iter().filter(|r| !r.success).count() as i32,
        backoff_count: global_backoff.len() as i32,
        observed: global_observed.len() as i32,
        per_seed,
    }
}

/// Builds the fixed-port probe URL gossip discovers an address under.
pub(crate) fn probe_base_url(address: &str, probe_port: u16) -> String {
    let ip_part = address.rsplit_once(':').map(|(ip, _)| ip).unwrap_or(address);
    format!("http://{ip_part}:{probe_port}")
}
