//! Stage D: deduplicated stats probing in bounded-size sequential batches.

use chrono::{DateTime, Utc};
use ingestor_rpc::PeerClient;
use ingestor_sql::Id;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct ProbeTask {
    pub pnode_id: Id,
    pub seed_base_url: String,
    pub probe_base_url: String,
    /// `failureCount` as read at Stage B eligibility time; the failure path
    /// increments from this value rather than re-reading the row, since no
    /// other branch can mutate it between decision and probe (§5).
    pub failure_count_at_decision: i32,
}

#[derive(Debug, Clone)]
pub struct TaskOutcome {
    pub seed_base_url: String,
    pub success: bool,
}

/// Runs `tasks` in sequential batches of `batch_size`, concurrent within
/// each batch. Batching bounds how many store connections and outbound
/// sockets a single cycle can hold open at once.
pub async fn run_batches(
    tasks: &[ProbeTask],
    batch_size: usize,
    rpc: &PeerClient,
    db: &sqlx::PgPool,
    cycle_start: DateTime<Utc>,
) -> Vec<TaskOutcome> {
    let mut results = Vec::with_capacity(tasks.len());
    for batch in tasks.chunks(batch_size.max(1)) {
        let batch_results = futures::future::join_all(
            batch.iter().map(|task| run_one(task, rpc, db, cycle_start)),
        )
        .await;
        results.extend(batch_results);
    }
    results
}

async fn run_one(
    task: &ProbeTask,
    rpc: &PeerClient,
    db: &sqlx::PgPool,
    cycle_start: DateTime<Utc>,
) -> TaskOutcome {
    match rpc.get_stats(&task.probe_base_url).await {
        Ok(stats) => {
            if let Err(err) = record_success(task, stats, db, cycle_start).await {
                warn!(pnode_id = task.pnode_id, error = %err, "failed to persist successful probe");
                return TaskOutcome {
                    seed_base_url: task.seed_base_url.clone(),
                    success: false,
                };
            }
            TaskOutcome {
                seed_base_url: task.seed_base_url.clone(),
                success: true,
            }
        }
        Err(err) => {
            warn!(pnode_id = task.pnode_id, url = task.probe_base_url, error = %err, "probe failed");
            if let Err(store_err) = record_failure(task, db, cycle_start).await {
                warn!(pnode_id = task.pnode_id, error = %store_err, "failed to persist probe failure");
            }
            TaskOutcome {
                seed_base_url: task.seed_base_url.clone(),
                success: false,
            }
        }
    }
}

async fn record_success(
    task: &ProbeTask,
    stats: ingestor_rpc::Stats,
    db: &sqlx::PgPool,
    cycle_start: DateTime<Utc>,
) -> sqlx::Result<()> {
    let prior = ingestor_sql::stats::find_latest_for_peer(task.pnode_id, db).await?;
    let rates = crate::rates::derive_all(
        prior.as_ref(),
        cycle_start,
        stats.packets_received,
        stats.packets_sent,
    );

    ingestor_sql::stats::insert(
        ingestor_sql::stats::NewSample {
            pnode_id: task.pnode_id,
            seed_base_url: &task.seed_base_url,
            timestamp: cycle_start,
            uptime_seconds: stats.uptime,
            packets_received_cumulative: stats.packets_received,
            packets_sent_cumulative: stats.packets_sent,
            total_bytes: stats.total_bytes,
            active_streams: stats.active_streams,
            packets_in_per_sec: rates.packets_in_per_sec,
            packets_out_per_sec: rates.packets_out_per_sec,
        },
        db,
    )
    .await?;

    ingestor_sql::peers::record_probe_success(
        task.pnode_id,
        cycle_start,
        cycle_start + chrono::Duration::seconds(60),
        db,
    )
    .await
}

async fn record_failure(
    task: &ProbeTask,
    db: &sqlx::PgPool,
    cycle_start: DateTime<Utc>,
) -> sqlx::Result<()> {
    let new_failure_count = task.failure_count_at_decision + 1;
    let exponent = new_failure_count.min(5) as u32;
    let delay_seconds = 60i64 * 2i64.pow(exponent);

    ingestor_sql::peers::record_probe_failure(
        task.pnode_id,
        new_failure_count,
        cycle_start,
        cycle_start + chrono::Duration::seconds(delay_seconds),
        db,
    )
    .await
}
