//! Cycle-fatal errors. Per-seed and per-peer failures are local (logged and
//! counted in place, see `ingest`) and never constructed as one of these;
//! this enum exists only for the handful of failures that abort a whole
//! cycle or supervisor action.

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("failed to open ingestion run: {0}")]
    OpenRun(#[source] sqlx::Error),

    #[error("failed to finalize ingestion run {run_id}: {source}")]
    FinishRun {
        run_id: ingestor_sql::Id,
        #[source]
        source: sqlx::Error,
    },

    #[error("store error: {0}")]
    Store(#[from] sqlx::Error),
}
