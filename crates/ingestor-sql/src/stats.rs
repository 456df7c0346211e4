//! Operations over `pnode_stats_sample`, the append-only record of one
//! successful direct probe.

use crate::Id;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone)]
pub struct StatsSample {
    pub pnode_id: Id,
    pub timestamp: DateTime<Utc>,
    pub uptime_seconds: Option<i64>,
    pub packets_received_cumulative: Option<i64>,
    pub packets_sent_cumulative: Option<i64>,
    pub total_bytes: Option<i64>,
}

pub async fn find_latest_for_peer(
    pnode_id: Id,
    db: &sqlx::PgPool,
) -> sqlx::Result<Option<StatsSample>> {
    sqlx::query_as!(
        StatsSample,
        r#"
        select pnode_id, "timestamp", uptime_seconds,
               packets_received_cumulative, packets_sent_cumulative, total_bytes
        from pnode_stats_sample
        where pnode_id = $1
        order by "timestamp" desc
        limit 1
        "#,
        pnode_id,
    )
    .fetch_optional(db)
    .await
}

pub struct NewSample<'a> {
    pub pnode_id: Id,
    pub seed_base_url: &'a str,
    pub timestamp: DateTime<Utc>,
    pub uptime_seconds: Option<i64>,
    pub packets_received_cumulative: Option<i64>,
    pub packets_sent_cumulative: Option<i64>,
    pub total_bytes: Option<i64>,
    pub active_streams: Option<i32>,
    pub packets_in_per_sec: Option<f64>,
    pub packets_out_per_sec: Option<f64>,
}

pub async fn insert(row: NewSample<'_>, db: &sqlx::PgPool) -> sqlx::Result<Id> {
    let inserted = sqlx::query!(
        r#"
        insert into pnode_stats_sample (
            pnode_id, seed_base_url, "timestamp", uptime_seconds,
            packets_received_cumulative, packets_sent_cumulative, total_bytes,
            active_streams, packets_in_per_sec, packets_out_per_sec
        )
        values ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        returning id
        "#,
        row.pnode_id,
        row.seed_base_url,
        row.timestamp,
        row.uptime_seconds,
        row.packets_received_cumulative,
        row.packets_sent_cumulative,
        row.total_bytes,
        row.active_streams,
        row.packets_in_per_sec,
        row.packets_out_per_sec,
    )
    .fetch_one(db)
    .await?;
    Ok(inserted.id)
}

/// Latest stats sample per peer, for the snapshot computer's uptime
/// percentiles.
#[derive(Debug, Clone)]
pub struct LatestUptime {
    pub pnode_id: Id,
    pub uptime_seconds: Option<i64>,
}

pub async fn latest_uptime_for_peers(
    pnode_ids: &[Id],
    db: &sqlx::PgPool,
) -> sqlx::Result<Vec<LatestUptime>> {
    sqlx::query_as!(
        LatestUptime,
        r#"
        select distinct on (pnode_id) pnode_id, uptime_seconds
        from pnode_stats_sample
        where pnode_id = any($1)
        order by pnode_id, "timestamp" desc
        "#,
        pnode_ids,
    )
    .fetch_all(db)
    .await
}
