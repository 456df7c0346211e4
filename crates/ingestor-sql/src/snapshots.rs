//! Operations over `network_snapshot` and its three child tables. A
//! snapshot and all of its children are written as one call so a reader
//! never observes a snapshot with a subset of its children present.

use crate::Id;

pub struct Scalars {
    pub run_id: Id,
    pub total_nodes: i32,
    pub reachable_nodes: i32,
    pub unreachable_nodes: i32,
    pub reachable_percent: f64,
    pub median_uptime_seconds: i64,
    pub p90_uptime_seconds: i64,
    pub total_storage_committed: i64,
    pub total_storage_used: i64,
    pub nodes_backed_off: i32,
    pub nodes_failing_stats: i32,
}

pub struct VersionStat {
    pub version: String,
    pub count: i32,
}

pub struct SeedVisibility<'a> {
    pub seed_base_url: &'a str,
    pub nodes_seen: i32,
    pub fresh: i32,
    pub stale: i32,
    pub offline: i32,
}

pub struct CreditsStat {
    pub median_credits: Option<f64>,
    pub p90_credits: Option<f64>,
}

pub async fn insert(
    scalars: Scalars,
    version_stats: &[VersionStat],
    seed_visibility: &[SeedVisibility<'_>],
    credits_stat: CreditsStat,
    db: &sqlx::PgPool,
) -> sqlx::Result<Id> {
    let mut txn = db.begin().await?;

    let snapshot = sqlx::query!(
        r#"
        insert into network_snapshot (
            run_id, total_nodes, reachable_nodes, unreachable_nodes, reachable_percent,
            median_uptime_seconds, p90_uptime_seconds, total_storage_committed,
            total_storage_used, nodes_backed_off, nodes_failing_stats
        )
        values ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        returning id
        "#,
        scalars.run_id,
        scalars.total_nodes,
        scalars.reachable_nodes,
        scalars.unreachable_nodes,
        scalars.reachable_percent,
        scalars.median_uptime_seconds,
        scalars.p90_uptime_seconds,
        scalars.total_storage_committed,
        scalars.total_storage_used,
        scalars.nodes_backed_off,
        scalars.nodes_failing_stats,
    )
    .fetch_one(&mut *txn)
    .await?;
    let snapshot_id = snapshot.id;

    for v in version_stats {
        sqlx::query!(
            r#"insert into network_version_stat (snapshot_id, version, count) values ($1, $2, $3)"#,
            snapshot_id,
            v.version,
            v.count,
        )
        .execute(&mut *txn)
        .await?;
    }

    for s in seed_visibility {
        sqlx::query!(
            r#"
            insert into network_seed_visibility
                (snapshot_id, seed_base_url, nodes_seen, fresh, stale, offline)
            values ($1, $2, $3, $4, $5, $6)
            "#,
            snapshot_id,
            s.seed_base_url,
            s.nodes_seen,
            s.fresh,
            s.stale,
            s.offline,
        )
        .execute(&mut *txn)
        .await?;
    }

    sqlx::query!(
        r#"
        insert into network_credits_stat (snapshot_id, median_credits, p90_credits)
        values ($1, $2, $3)
        "#,
        snapshot_id,
        credits_stat.median_credits,
        credits_stat.p90_credits,
    )
    .execute(&mut *txn)
    .await?;

    txn.commit().await?;
    Ok(snapshot_id)
}
