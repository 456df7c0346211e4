//! C3: typed operations over the ingestion store's Postgres schema. Each
//! module groups the statements for one entity, mirroring how the teacher's
//! `agent-sql` crate is split by domain concern rather than by statement
//! kind. Every write here is a prepared statement and is safe to execute
//! concurrently; callers own whatever ordering spec.md §5 requires.

pub mod cleanup;
pub mod credits;
pub mod gossip;
pub mod peers;
pub mod runs;
pub mod snapshots;
pub mod stats;

/// Surrogate integer key shared by every table in this schema.
pub type Id = i64;

/// Connects a Postgres pool with sane defaults for this service: a small
/// pool (the store is the only contended resource per spec.md §5) and a
/// short acquire timeout so a saturated pool fails fast instead of wedging
/// a whole ingestion cycle.
pub async fn connect(database_url: &str, pool_size: u32) -> Result<sqlx::PgPool, sqlx::Error> {
    sqlx::postgres::PgPoolOptions::new()
        .max_connections(pool_size)
        .acquire_timeout(std::time::Duration::from_secs(5))
        .connect(database_url)
        .await
}
