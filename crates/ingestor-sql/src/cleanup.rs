//! Row-count and cutoff-deletion primitives for C5. Table/column names must
//! be literal for `sqlx::query!`, so each cleanup target gets its own match
//! arm rather than a single generically-parameterized query.

use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table {
    GossipObservation,
    StatsSample,
    IngestionRun,
}

impl Table {
    pub const ALL: [Table; 3] = [Table::GossipObservation, Table::StatsSample, Table::IngestionRun];
}

pub async fn count_rows(table: Table, db: &sqlx::PgPool) -> sqlx::Result<i64> {
    let count = match table {
        Table::GossipObservation => {
            sqlx::query_scalar!(r#"select count(*) as "count!" from pnode_gossip_observation"#)
                .fetch_one(db)
                .await?
        }
        Table::StatsSample => {
            sqlx::query_scalar!(r#"select count(*) as "count!" from pnode_stats_sample"#)
                .fetch_one(db)
                .await?
        }
        Table::IngestionRun => {
            sqlx::query_scalar!(r#"select count(*) as "count!" from ingestion_run"#)
                .fetch_one(db)
                .await?
        }
    };
    Ok(count)
}

/// The time-column value of the n-th oldest row (1-indexed), or `None` if
/// the table has fewer than `n` rows.
pub async fn find_nth_oldest(
    table: Table,
    n: i64,
    db: &sqlx::PgPool,
) -> sqlx::Result<Option<DateTime<Utc>>> {
    if n <= 0 {
        return Ok(None);
    }
    let cutoff = match table {
        Table::GossipObservation => {
            sqlx::query_scalar!(
                r#"select observed_at from pnode_gossip_observation order by observed_at limit 1 offset $1"#,
                n - 1,
            )
            .fetch_optional(db)
            .await?
        }
        Table::StatsSample => {
            sqlx::query_scalar!(
                r#"select "timestamp" from pnode_stats_sample order by "timestamp" limit 1 offset $1"#,
                n - 1,
            )
            .fetch_optional(db)
            .await?
        }
        Table::IngestionRun => {
            sqlx::query_scalar!(
                r#"select started_at from ingestion_run order by started_at limit 1 offset $1"#,
                n - 1,
            )
            .fetch_optional(db)
            .await?
        }
    };
    Ok(cutoff)
}

/// Deletes all rows whose time column is strictly less than `cutoff`,
/// preserving the invariant that no retained row is older than any deleted
/// one. `IngestionRun` deletions cascade to its snapshot/seed-stats children.
pub async fn delete_older_than(
    table: Table,
    cutoff: DateTime<Utc>,
    db: &sqlx::PgPool,
) -> sqlx::Result<u64> {
    let result = match table {
        Table::GossipObservation => {
            sqlx::query!(
                r#"delete from pnode_gossip_observation where observed_at < $1"#,
                cutoff,
            )
            .execute(db)
            .await?
        }
        Table::StatsSample => {
            sqlx::query!(r#"delete from pnode_stats_sample where "timestamp" < $1"#, cutoff,)
                .execute(db)
                .await?
        }
        Table::IngestionRun => {
            sqlx::query!(r#"delete from ingestion_run where started_at < $1"#, cutoff,)
                .execute(db)
                .await?
        }
    };
    Ok(result.rows_affected())
}
