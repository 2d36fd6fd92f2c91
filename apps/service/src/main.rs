mod config;
mod monitoring;
mod pool;
mod store;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};

use config::Config;
use monitoring::{Prober, Registry};
use pool::{LibsqlManager, LibsqlPool};
use store::Repository;

/// URL uptime monitor service.
#[derive(Debug, Parser)]
#[command(name = "upwatch-service", version, about)]
struct Cli {
    /// Path to the configuration file (created with defaults if absent).
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    logger::init_tracing();

    let cli = Cli::parse();
    let config = Config::from_config(cli.config.as_deref()).context("loading configuration")?;

    info!(database = %config.database.path.display(), "starting upwatch service");

    let database = libsql::Builder::new_local(&config.database.path)
        .build()
        .await
        .context("opening database")?;
    let pool: LibsqlPool = deadpool::managed::Pool::builder(LibsqlManager::new(database))
        .config(deadpool::managed::PoolConfig::default())
        .build()
        .context("building connection pool")?;

    {
        let conn = pool.get().await.context("connecting to database")?;
        store::initialize_store(&conn).await.context("running migrations")?;
    }

    let store = Arc::new(Repository::new_from_pool(pool));
    let prober = Arc::new(Prober::new(Duration::from_secs(config.probe.timeout_seconds))?);
    let registry = Registry::new(prober, store);

    registry.bootstrap().await?;

    tokio::signal::ctrl_c().await.context("waiting for interrupt signal")?;
    info!("interrupt received, shutting down");

    let grace = Duration::from_secs(config.shutdown.grace_seconds);
    if let Err(error) = registry.shutdown(grace).await {
        error!(%error, "graceful shutdown incomplete");
        return Err(error.into());
    }

    info!("shutdown complete");
    Ok(())
}
