use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use tracing::info;
use tracing_subscriber::EnvFilter;

use skywatch_common::Config;
use skywatch_dedup::{CancelFlag, DedupConfig, DedupEngine};
use skywatch_store::{migrate, PgIncidentStore};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("skywatch=info".parse()?))
        .init();

    info!("Skywatch dedup starting...");

    // Load config
    let config = Config::from_env();

    // Connect to Postgres
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;

    // Run migrations
    migrate(&pool).await?;

    let store = PgIncidentStore::new(pool);
    let engine = DedupEngine::new(store, DedupConfig::from_config(&config));

    // Ctrl-C stops the run between merges; applied merges stay applied.
    let cancel = CancelFlag::new();
    let ctrl_c_flag = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown requested, finishing current merge");
            ctrl_c_flag.cancel();
        }
    });

    let outcome = engine.run(&cancel).await?;
    println!("{}", outcome.stats);

    Ok(())
}
