//! C5: threshold-triggered retention. Orchestrates the primitives in
//! `ingestor_sql::cleanup` against the policy table in `config`.

use crate::config::CleanupPolicy;
use tracing::{info, warn};

#[derive(Debug, Default)]
pub struct CleanupReport {
    pub tables_checked: usize,
    pub tables_triggered: usize,
    pub rows_deleted: u64,
}

/// Counts every configured table; for each whose count exceeds its trigger,
/// finds the cutoff that would shrink it to its target and deletes
/// everything older. Idempotent and safe to call repeatedly — a table under
/// its trigger is left untouched.
#[tracing::instrument(skip(policies, db))]
pub async fn run(policies: &[CleanupPolicy], db: &sqlx::PgPool) -> sqlx::Result<CleanupReport> {
    let mut report = CleanupReport {
        tables_checked: policies.len(),
        ..Default::default()
    };

    for policy in policies {
        let count = ingestor_sql::cleanup::count_rows(policy.table, db).await?;
        if count <= policy.threshold {
            continue;
        }
        report.tables_triggered += 1;

        let excess = count - policy.target;
        // `find_nth_oldest` is 1-indexed; the first row to *keep* sits at
        // position `excess + 1`, so deleting everything strictly older than
        // its timestamp removes exactly the oldest `excess` rows.
        let cutoff = ingestor_sql::cleanup::find_nth_oldest(policy.table, excess + 1, db).await?;
        let Some(cutoff) = cutoff else {
            warn!(table = ?policy.table, "trigger crossed but cutoff lookup found no rows");
            continue;
        };

        let deleted = ingestor_sql::cleanup::delete_older_than(policy.table, cutoff, db).await?;
        report.rows_deleted += deleted;
        info!(table = ?policy.table, count, deleted, "cleanup triggered");
    }

    Ok(report)
}
