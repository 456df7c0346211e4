//! Health HTTP endpoint, §4.8/§6. A tiny `axum` app exposing `GET /health`
//! against the scheduler's shared state.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

use crate::scheduler::SharedState;

#[derive(Serialize)]
struct HealthBody {
    status: &'static str,
    uptime_seconds: i64,
    last_successful_ingestion: Option<DateTime<Utc>>,
    last_ingestion_attempt: Option<DateTime<Utc>>,
    ingestion_failure_count: u32,
    database: &'static str,
    timestamp: DateTime<Utc>,
}

pub fn router(state: Arc<SharedState>) -> Router {
    Router::new().route("/health", get(handler)).with_state(state)
}

async fn handler(State(state): State<Arc<SharedState>>) -> impl IntoResponse {
    let snapshot = state.snapshot().await;
    let database_ok = sqlx::query_scalar!("select 1 as \"ok!\"")
        .fetch_one(&state.db)
        .await
        .is_ok();

    let body = HealthBody {
        status: if database_ok { "ok" } else { "degraded" },
        uptime_seconds: (Utc::now() - state.started_at).num_seconds(),
        last_successful_ingestion: snapshot.last_success_at,
        last_ingestion_attempt: snapshot.last_attempt_at,
        ingestion_failure_count: snapshot.consecutive_failures,
        database: if database_ok { "ok" } else { "unreachable" },
        timestamp: Utc::now(),
    };

    let status = if database_ok {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (status, Json(body))
}
