use anyhow::Context;
use clap::Parser;
use ingestor::config::Args;
use ingestor_rpc::{CreditsClient, PeerClient};

fn main() -> Result<(), anyhow::Error> {
    // Required in order for libraries to use `rustls` for TLS.
    // See: https://docs.rs/rustls/latest/rustls/crypto/struct.CryptoProvider.html
    rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .expect("failed to install default crypto provider");

    // Use reasonable defaults for printing structured logs to stderr.
    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_ansi(!matches!(std::env::var("NO_COLOR"), Ok(v) if v == "1"))
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting tracing default failed");

    let args = Args::parse();
    tracing::info!(?args, "started!");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    let task = runtime.spawn(async move { async_main(args).await });
    let result = runtime.block_on(task);

    tracing::info!(?result, "main function completed, shutting down runtime");
    runtime.shutdown_timeout(std::time::Duration::from_secs(5));
    result?
}

async fn async_main(args: Args) -> Result<(), anyhow::Error> {
    let pg_options = args
        .database_url
        .parse::<sqlx::postgres::PgConnectOptions>()
        .context("parsing database URL")?
        .application_name(
            &std::env::var("HOSTNAME").unwrap_or_else(|_| "ingestor".to_string()),
        );

    let pg_pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(args.store_pool_size)
        .acquire_timeout(std::time::Duration::from_secs(5))
        .connect_with(pg_options)
        .await
        .context("connecting to database")?;

    sqlx::migrate!("../ingestor-sql/migrations")
        .run(&pg_pool)
        .await
        .context("running store migrations")?;

    // Periodically log information about the connection pool to aid in debugging.
    let pool_copy = pg_pool.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(120));
        loop {
            interval.tick().await;
            tracing::info!(
                total_connections = pool_copy.size(),
                idle_connections = pool_copy.num_idle(),
                "db connection pool stats"
            );
        }
    });

    let rpc = PeerClient::new(args.rpc_timeout);
    let credits = CreditsClient::new(args.credits_url.clone(), args.credits_timeout);

    ingestor::scheduler::run(args, pg_pool, rpc, credits).await
}
