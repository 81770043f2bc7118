//! OCP Usage Aggregator
//!
//! Reads a billing period's worth of partitioned OpenShift usage data from
//! an S3-compatible object store, aggregates it into per-day summary rows,
//! and writes the result to the target reporting database.

use clap::Parser;
use core_config::tracing::{init_tracing, install_color_eyre};
use core_config::Environment;
use eyre::Result;
use tracing::info;

mod config;
mod orchestrator;

use config::Config;

#[derive(Parser)]
#[command(name = "ocp-aggregator")]
#[command(about = "Aggregate partitioned OpenShift usage data into per-day summary rows")]
struct Cli {
    /// Truncate this run's identity-scoped rows before writing (overrides
    /// AGG_TRUNCATE from the environment).
    #[arg(long)]
    truncate: bool,

    /// Run database migrations and exit, without aggregating anything.
    #[arg(long)]
    migrate_only: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    install_color_eyre()?;

    let mut config = Config::from_env()?;
    let environment = Environment::from_env();
    init_tracing(&environment);
    observability::init_metrics();

    let cli = Cli::parse();
    if cli.truncate {
        config.aggregator.truncate = true;
    }

    info!("connecting to database...");
    let db = database::postgres::connect_from_config_with_retry(config.database.clone(), None)
        .await
        .map_err(|e| eyre::eyre!("database connection failed: {e}"))?;

    if cli.migrate_only {
        orchestrator::run_migrations(&db).await?;
        info!("migrations complete");
        return Ok(());
    }

    orchestrator::run_migrations(&db).await?;

    let summary = orchestrator::run(config, &db).await?;
    println!("{}", serde_json::to_string_pretty(&summary)?);

    Ok(())
}
