//! Operations over `ingestion_run` and its child `ingestion_run_seed_stats`.

use crate::Id;
use chrono::{DateTime, Utc};

pub async fn insert(started_at: DateTime<Utc>, db: &sqlx::PgPool) -> sqlx::Result<Id> {
    let inserted = sqlx::query!(
        r#"insert into ingestion_run (started_at) values ($1) returning id"#,
        started_at,
    )
    .fetch_one(db)
    .await?;
    Ok(inserted.id)
}

pub struct RunSummary {
    pub finished_at: DateTime<Utc>,
    pub attempted: i32,
    pub success: i32,
    pub failed: i32,
    pub backoff: i32,
    pub observed: i32,
}

pub async fn finish(id: Id, summary: RunSummary, db: &sqlx::PgPool) -> sqlx::Result<()> {
    sqlx::query!(
        r#"
        update ingestion_run
        set finished_at = $2, attempted = $3, success = $4, failed = $5,
            backoff = $6, observed = $7
        where id = $1
        "#,
        id,
        summary.finished_at,
        summary.attempted,
        summary.success,
        summary.failed,
        summary.backoff,
        summary.observed,
    )
    .execute(db)
    .await?;
    Ok(())
}

pub struct SeedStats<'a> {
    pub seed_base_url: &'a str,
    pub attempted: i32,
    pub backoff: i32,
    pub success: i32,
    pub failed: i32,
    pub observed: i32,
}

/// Inserts one row per seed in a single round-trip.
pub async fn insert_seed_stats(
    run_id: Id,
    rows: &[SeedStats<'_>],
    db: &sqlx::PgPool,
) -> sqlx::Result<()> {
    if rows.is_empty() {
        return Ok(());
    }

    let run_ids: Vec<Id> = rows.iter().map(|_| run_id).collect();
    let seed_base_urls: Vec<&str> = rows.iter().map(|r| r.seed_base_url).collect();
    let attempted: Vec<i32> = rows.iter().map(|r| r.attempted).collect();
    let backoff: Vec<i32> = rows.iter().map(|r| r.backoff).collect();
    let success: Vec<i32> = rows.iter().map(|r| r.success).collect();
    let failed: Vec<i32> = rows.iter().map(|r| r.failed).collect();
    let observed: Vec<i32> = rows.iter().map(|r| r.observed).collect();

    sqlx::query!(
        r#"
        insert into ingestion_run_seed_stats
            (run_id, seed_base_url, attempted, backoff, success, failed, observed)
        select * from unnest(
            $1::bigint[], $2::text[], $3::int[], $4::int[], $5::int[], $6::int[], $7::int[]
        )
        "#,
        &run_ids,
        &seed_base_urls as &[&str],
        &attempted,
        &backoff,
        &success,
        &failed,
        &observed,
    )
    .execute(db)
    .await?;
    Ok(())
}
