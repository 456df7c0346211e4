//! Operations over `pnode`, the persistent peer identity table.

use crate::Id;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone)]
pub struct Peer {
    pub id: Id,
    pub pubkey: String,
    pub is_public: bool,
    pub failure_count: i32,
    pub last_stats_attempt_at: Option<DateTime<Utc>>,
    pub last_stats_success_at: Option<DateTime<Utc>>,
    pub next_stats_allowed_at: Option<DateTime<Utc>>,
    pub latest_credits: Option<f64>,
    pub credits_updated_at: Option<DateTime<Utc>>,
}

/// Eligibility-relevant slice of a peer, read during Stage B of the
/// ingestion cycle without pulling the full row.
#[derive(Debug, Clone)]
pub struct BackoffState {
    pub id: Id,
    pub failure_count: i32,
    pub next_stats_allowed_at: Option<DateTime<Utc>>,
}

/// Upserts a peer by `pubkey`, setting `is_public` from the gossip claim.
/// Returns the peer's id and its backoff state as of just before this
/// upsert applied the new `is_public` value, for the caller's Stage B
/// eligibility decision.
pub async fn upsert_peer(
    pubkey: &str,
    is_public: bool,
    db: &sqlx::PgPool,
) -> sqlx::Result<BackoffState> {
    sqlx::query_as!(
        BackoffState,
        r#"
        insert into pnode (pubkey, is_public)
        values ($1, $2)
        on conflict (pubkey) do update set is_public = excluded.is_public
        returning id, failure_count, next_stats_allowed_at
        "#,
        pubkey,
        is_public,
    )
    .fetch_one(db)
    .await
}

pub async fn find_by_id(id: Id, db: &sqlx::PgPool) -> sqlx::Result<Option<Peer>> {
    sqlx::query_as!(
        Peer,
        r#"
        select id, pubkey, is_public, failure_count,
               last_stats_attempt_at, last_stats_success_at, next_stats_allowed_at,
               latest_credits, credits_updated_at
        from pnode
        where id = $1
        "#,
        id,
    )
    .fetch_optional(db)
    .await
}

/// Stage A: any peer whose backoff expired more than 24h ago and who is
/// still carrying failures is reset, so a worker outage doesn't exile a
/// peer permanently.
pub async fn reset_expired_backoff(
    now: DateTime<Utc>,
    db: &sqlx::PgPool,
) -> sqlx::Result<u64> {
    let cutoff = now - chrono::Duration::hours(24);
    let result = sqlx::query!(
        r#"
        update pnode
        set failure_count = 0, next_stats_allowed_at = null
        where failure_count > 0 and next_stats_allowed_at < $1
        "#,
        cutoff,
    )
    .execute(db)
    .await?;
    Ok(result.rows_affected())
}

/// Clears a peer's backoff fields immediately, used for the Stage B
/// "delayed reset" case: backoff has expired but was never cleared because
/// no probe ran in the meantime.
pub async fn clear_backoff(id: Id, db: &sqlx::PgPool) -> sqlx::Result<()> {
    sqlx::query!(
        r#"update pnode set failure_count = 0, next_stats_allowed_at = null where id = $1"#,
        id,
    )
    .execute(db)
    .await?;
    Ok(())
}

/// Applied after a successful probe: clears failures and opens a 60s window.
pub async fn record_probe_success(
    id: Id,
    attempt_at: DateTime<Utc>,
    next_allowed_at: DateTime<Utc>,
    db: &sqlx::PgPool,
) -> sqlx::Result<()> {
    sqlx::query!(
        r#"
        update pnode
        set failure_count = 0,
            last_stats_attempt_at = $2,
            last_stats_success_at = $2,
            next_stats_allowed_at = $3
        where id = $1
        "#,
        id,
        attempt_at,
        next_allowed_at,
    )
    .execute(db)
    .await?;
    Ok(())
}

/// Applied after a failed probe: increments failures and backs off.
pub async fn record_probe_failure(
    id: Id,
    new_failure_count: i32,
    attempt_at: DateTime<Utc>,
    next_allowed_at: DateTime<Utc>,
    db: &sqlx::PgPool,
) -> sqlx::Result<()> {
    sqlx::query!(
        r#"
        update pnode
        set failure_count = $2,
            last_stats_attempt_at = $3,
            next_stats_allowed_at = $4
        where id = $1
        "#,
        id,
        new_failure_count,
        attempt_at,
        next_allowed_at,
    )
    .execute(db)
    .await?;
    Ok(())
}

/// One page of peers for the snapshot computer (C7), 500 rows at a time
/// ordered by id for stable pagination.
pub async fn page(
    after_id: Id,
    page_size: i64,
    db: &sqlx::PgPool,
) -> sqlx::Result<Vec<Peer>> {
    sqlx::query_as!(
        Peer,
        r#"
        select id, pubkey, is_public, failure_count,
               last_stats_attempt_at, last_stats_success_at, next_stats_allowed_at,
               latest_credits, credits_updated_at
        from pnode
        where id > $1
        order by id
        limit $2
        "#,
        after_id,
        page_size,
    )
    .fetch_all(db)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_state_is_plain_data() {
        let state = BackoffState {
            id: 1,
            failure_count: 0,
            next_stats_allowed_at: None,
        };
        assert_eq!(state.failure_count, 0);
    }
}
