//! C8: scheduler/supervisor. Drives C6, C2, and C5 on independent periodic
//! timers, tracks a circuit breaker over ingestion cycles, logs a heartbeat,
//! serves the health endpoint, and shuts down cleanly on signal.

use crate::config::Args;
use crate::ingest::CycleConfig;
use chrono::{DateTime, Utc};
use ingestor_rpc::{CreditsClient, PeerClient};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

const STARTUP_PROBE_TIMEOUT: Duration = Duration::from_secs(5);
const STARTUP_PROBE_SEED_COUNT: usize = 3;
const CLEANUP_TIMEOUT: Duration = Duration::from_secs(5 * 60);
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(10 * 60);
const HEARTBEAT_STALE_AFTER: chrono::Duration = chrono::Duration::minutes(30);

struct Inner {
    last_success_at: Option<DateTime<Utc>>,
    last_attempt_at: Option<DateTime<Utc>>,
    consecutive_failures: u32,
    breaker_open_until: Option<DateTime<Utc>>,
}

pub struct StateSnapshot {
    pub last_success_at: Option<DateTime<Utc>>,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub consecutive_failures: u32,
}

/// State shared between the supervisor loop and the health endpoint.
pub struct SharedState {
    pub db: sqlx::PgPool,
    pub started_at: DateTime<Utc>,
    inner: RwLock<Inner>,
}

impl SharedState {
    fn new(db: sqlx::PgPool) -> Self {
        Self {
            db,
            started_at: Utc::now(),
            inner: RwLock::new(Inner {
                last_success_at: None,
                last_attempt_at: None,
                consecutive_failures: 0,
                breaker_open_until: None,
            }),
        }
    }

    pub async fn snapshot(&self) -> StateSnapshot {
        let inner = self.inner.read().await;
        StateSnapshot {
            last_success_at: inner.last_success_at,
            last_attempt_at: inner.last_attempt_at,
            consecutive_failures: inner.consecutive_failures,
        }
    }
}

/// Validates the store connection (already open by the time this runs) and
/// at least one configured seed before the supervisor starts its timers.
/// The first `STARTUP_PROBE_SEED_COUNT` seeds are tried with a short
/// dedicated timeout; a single success is enough.
async fn validate_seeds(seeds: &[url::Url]) -> bool {
    let probe = PeerClient::new(STARTUP_PROBE_TIMEOUT);
    for seed in seeds.iter().take(STARTUP_PROBE_SEED_COUNT) {
        match probe.get_pods(seed.as_str().trim_end_matches('/')).await {
            Ok(_) => return true,
            Err(err) => warn!(seed = %seed, error = %err, "startup seed probe failed"),
        }
    }
    false
}

/// Runs the supervisor to completion: startup validation, one of each cycle
/// kind, then the three independent timers until a shutdown signal arrives.
pub async fn run(
    args: Args,
    db: sqlx::PgPool,
    rpc: PeerClient,
    credits: CreditsClient,
) -> anyhow::Result<()> {
    if !validate_seeds(&args.seed_urls).await {
        warn!("no configured seed answered the startup probe; continuing anyway");
    }

    let state = Arc::new(SharedState::new(db.clone()));
    let cycle_config = CycleConfig {
        seeds: args.seed_urls.clone(),
        seed_fanout: args.seed_fanout,
        probe_batch_size: args.probe_batch_size,
        probe_port: args.probe_port,
    };
    let cleanup_policies = args.cleanup_policy();

    run_ingest_tick(&state, &cycle_config, &rpc, args.breaker_threshold, args.breaker_cooldown).await;
    run_credits_tick(&state, &credits).await;
    run_cleanup_tick(&state, &cleanup_policies).await;

    let health_app = crate::health::router(state.clone());
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", args.health_check_port)).await?;
    let health_server = tokio::spawn(async move {
        if let Err(err) = axum::serve(listener, health_app).await {
            error!(error = %err, "health server exited");
        }
    });

    let mut ingest_interval = tokio::time::interval(args.ingest_interval);
    let mut credits_interval = tokio::time::interval(args.credits_interval);
    let mut cleanup_interval = tokio::time::interval(args.cleanup_check_interval);
    let mut heartbeat_interval = tokio::time::interval(HEARTBEAT_INTERVAL);
    ingest_interval.tick().await;
    credits_interval.tick().await;
    cleanup_interval.tick().await;
    heartbeat_interval.tick().await;

    loop {
        tokio::select! {
            _ = ingest_interval.tick() => {
                run_ingest_tick(&state, &cycle_config, &rpc, args.breaker_threshold, args.breaker_cooldown).await;
            }
            _ = credits_interval.tick() => {
                run_credits_tick(&state, &credits).await;
            }
            _ = cleanup_interval.tick() => {
                run_cleanup_tick(&state, &cleanup_policies).await;
            }
            _ = heartbeat_interval.tick() => {
                heartbeat(&state).await;
            }
            _ = shutdown_signal() => {
                info!("shutdown signal received, closing store pool");
                health_server.abort();
                state.db.close().await;
                return Ok(());
            }
        }
    }
}

async fn run_ingest_tick(
    state: &Arc<SharedState>,
    config: &CycleConfig,
    rpc: &PeerClient,
    breaker_threshold: u32,
    breaker_cooldown: Duration,
) {
    {
        let inner = state.inner.read().await;
        if let Some(until) = inner.breaker_open_until {
            if Utc::now() < until {
                info!(until = %until, "circuit breaker open, skipping ingestion cycle");
                return;
            }
        }
    }

    let attempt_at = Utc::now();
    let result = crate::ingest::run(config, rpc, &state.db).await;

    let mut inner = state.inner.write().await;
    inner.last_attempt_at = Some(attempt_at);
    match result {
        Ok(summary) => {
            info!(
                total_pods = summary.total_pods,
                stats_attempts = summary.stats_attempts,
                stats_success = summary.stats_success,
                stats_failure = summary.stats_failure,
                "ingestion cycle complete"
            );
            inner.last_success_at = Some(Utc::now());
            inner.consecutive_failures = 0;
            inner.breaker_open_until = None;
        }
        Err(err) => {
            inner.consecutive_failures += 1;
            error!(error = %err, consecutive_failures = inner.consecutive_failures, "ingestion cycle failed");
            if inner.consecutive_failures >= breaker_threshold {
                let until = Utc::now()
                    + chrono::Duration::from_std(breaker_cooldown).unwrap_or(chrono::Duration::minutes(5));
                warn!(until = %until, "circuit breaker opened after consecutive failures");
                inner.breaker_open_until = Some(until);
            }
        }
    }
}

async fn run_credits_tick(state: &Arc<SharedState>, credits: &CreditsClient) {
    match credits.get_storage_credits().await {
        Ok(readings) => {
            let mut recorded = 0u32;
            for reading in readings {
                match ingestor_sql::credits::find_peer_id_by_pubkey(&reading.pod_id, &state.db).await {
                    Ok(Some(peer_id)) => {
                        match ingestor_sql::credits::record_if_due(
                            peer_id,
                            &reading.pod_id,
                            reading.credits,
                            Utc::now(),
                            None,
                            &state.db,
                        )
                        .await
                        {
                            Ok(true) => recorded += 1,
                            Ok(false) => {}
                            Err(err) => warn!(pod_id = reading.pod_id, error = %err, "credits write failed"),
                        }
                    }
                    Ok(None) => {}
                    Err(err) => warn!(pod_id = reading.pod_id, error = %err, "credits peer lookup failed"),
                }
            }
            info!(recorded, "credits cycle complete");
        }
        Err(err) => warn!(error = %err, "credits fetch failed"),
    }
}

async fn run_cleanup_tick(state: &Arc<SharedState>, policies: &[crate::config::CleanupPolicy]) {
    let outcome = tokio::time::timeout(CLEANUP_TIMEOUT, crate::cleanup::run(policies, &state.db)).await;
    match outcome {
        Ok(Ok(report)) => {
            if report.tables_triggered > 0 {
                info!(
                    triggered = report.tables_triggered,
                    deleted = report.rows_deleted,
                    "cleanup cycle complete"
                );
            }
        }
        Ok(Err(err)) => warn!(error = %err, "cleanup cycle failed"),
        Err(_) => warn!("cleanup cycle exceeded its timeout; result discarded"),
    }
}

async fn heartbeat(state: &Arc<SharedState>) {
    let snapshot = state.snapshot().await;
    let uptime = Utc::now() - state.started_at;
    info!(
        uptime_seconds = uptime.num_seconds(),
        last_success = ?snapshot.last_success_at,
        consecutive_failures = snapshot.consecutive_failures,
        "heartbeat"
    );

    let stale = match snapshot.last_success_at {
        Some(last) => Utc::now() - last > HEARTBEAT_STALE_AFTER,
        None => uptime > HEARTBEAT_STALE_AFTER,
    };
    if stale {
        error!("no successful ingestion cycle in over 30 minutes");
    }
}

#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};
    let mut terminate = signal(SignalKind::terminate()).expect("install SIGTERM handler");
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = terminate.recv() => {}
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
