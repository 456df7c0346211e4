//! Operations over `pod_credits_snapshot` and the denormalized
//! `pnode.latest_credits`/`credits_updated_at` fields.

use crate::Id;
use chrono::{DateTime, Utc};

/// Returns the peer id for a pubkey if one is already known. Credits
/// ingestion never creates peers; it only annotates ones gossip has already
/// surfaced.
pub async fn find_peer_id_by_pubkey(
    pubkey: &str,
    db: &sqlx::PgPool,
) -> sqlx::Result<Option<Id>> {
    sqlx::query_scalar!(r#"select id from pnode where pubkey = $1"#, pubkey)
        .fetch_optional(db)
        .await
}

/// Inserts a credits reading and updates the peer's denormalized latest
/// value, but only if the peer hasn't already received a reading within the
/// last two hours, per spec's at-most-once-per-two-hours invariant.
pub async fn record_if_due(
    pnode_id: Id,
    pod_pubkey: &str,
    credits: f64,
    observed_at: DateTime<Utc>,
    seed_base_url: Option<&str>,
    db: &sqlx::PgPool,
) -> sqlx::Result<bool> {
    let mut txn = db.begin().await?;

    let last = sqlx::query_scalar!(
        r#"
        select observed_at from pod_credits_snapshot
        where pod_pubkey = $1
        order by observed_at desc
        limit 1
        "#,
        pod_pubkey,
    )
    .fetch_optional(&mut *txn)
    .await?;

    if let Some(last) = last {
        if observed_at - last < chrono::Duration::hours(2) {
            txn.commit().await?;
            return Ok(false);
        }
    }

    sqlx::query!(
        r#"
        insert into pod_credits_snapshot (pod_pubkey, credits, observed_at, seed_base_url)
        values ($1, $2, $3, $4)
        "#,
        pod_pubkey,
        credits,
        observed_at,
        seed_base_url,
    )
    .execute(&mut *txn)
    .await?;

    sqlx::query!(
        r#"update pnode set latest_credits = $2, credits_updated_at = $3 where id = $1"#,
        pnode_id,
        credits,
        observed_at,
    )
    .execute(&mut *txn)
    .await?;

    txn.commit().await?;
    Ok(true)
}

/// Non-null `latest_credits` across all peers, for the snapshot computer's
/// credit percentiles.
pub async fn all_latest_credits(db: &sqlx::PgPool) -> sqlx::Result<Vec<f64>> {
    sqlx::query_scalar!(
        r#"select latest_credits as "credits!" from pnode where latest_credits is not null"#
    )
    .fetch_all(db)
    .await
}
