//! Operations over `pnode_gossip_observation`, the append-only record of one
//! sighting of one peer in one seed's gossip view.

use crate::Id;
use chrono::{DateTime, Utc};

pub struct NewObservation<'a> {
    pub pnode_id: Id,
    pub seed_base_url: &'a str,
    pub observed_at: DateTime<Utc>,
    pub address: &'a str,
    pub version: Option<&'a str>,
    pub last_seen_timestamp: Option<i64>,
    pub storage_committed: Option<i64>,
    pub storage_used: Option<i64>,
    pub storage_usage_percent: Option<f64>,
    pub is_public: Option<bool>,
}

pub async fn insert(row: NewObservation<'_>, db: &sqlx::PgPool) -> sqlx::Result<Id> {
    let inserted = sqlx::query!(
        r#"
        insert into pnode_gossip_observation (
            pnode_id, seed_base_url, observed_at, address, version,
            last_seen_timestamp, storage_committed, storage_used,
            storage_usage_percent, is_public
        )
        values ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        returning id
        "#,
        row.pnode_id,
        row.seed_base_url,
        row.observed_at,
        row.address,
        row.version,
        row.last_seen_timestamp,
        row.storage_committed,
        row.storage_used,
        row.storage_usage_percent,
        row.is_public,
    )
    .fetch_one(db)
    .await?;
    Ok(inserted.id)
}

/// Latest gossip observation for a peer, regardless of which seed produced
/// it. Used by the snapshot computer for version/storage/reachability
/// aggregation.
#[derive(Debug, Clone)]
pub struct LatestForPeer {
    pub pnode_id: Id,
    pub version: Option<String>,
    pub storage_committed: Option<i64>,
    pub storage_used: Option<i64>,
}

pub async fn latest_for_peers(
    pnode_ids: &[Id],
    db: &sqlx::PgPool,
) -> sqlx::Result<Vec<LatestForPeer>> {
    sqlx::query_as!(
        LatestForPeer,
        r#"
        select distinct on (pnode_id)
            pnode_id, version, storage_committed, storage_used
        from pnode_gossip_observation
        where pnode_id = any($1)
        order by pnode_id, observed_at desc
        "#,
        pnode_ids,
    )
    .fetch_all(db)
    .await
}

/// Distinct peers a given seed has observed within `since`, along with the
/// most recently reported `last_seen_timestamp` for each, used by C7's
/// per-seed freshness bucketing.
#[derive(Debug, Clone)]
pub struct SeedSighting {
    pub pnode_id: Id,
    pub last_seen_timestamp: Option<i64>,
}

pub async fn seed_sightings_since(
    seed_base_url: &str,
    since: DateTime<Utc>,
    db: &sqlx::PgPool,
) -> sqlx::Result<Vec<SeedSighting>> {
    sqlx::query_as!(
        SeedSighting,
        r#"
        select distinct on (pnode_id)
            pnode_id, last_seen_timestamp
        from pnode_gossip_observation
        where seed_base_url = $1 and observed_at >= $2
        order by pnode_id, observed_at desc
        "#,
        seed_base_url,
        since,
    )
    .fetch_all(db)
    .await
}
