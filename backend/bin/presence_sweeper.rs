use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use clap::{Arg, Command};
use locator::{
    db::{DatabaseConfig, PgStore},
    services::{PresenceStore, PresenceSweeper},
    utils::{config::Config, init_logging},
};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let matches = Command::new("presence-sweeper")
        .about("Flip stale presences offline on a fixed interval")
        .arg(
            Arg::new("once")
                .long("once")
                .help("Run a single sweep and exit")
                .action(clap::ArgAction::SetTrue),
        )
        .get_matches();

    let config = Config::from_env()?;
    let db_config = DatabaseConfig::from_env()?;
    let store = PgStore::connect(&db_config).await?;

    let presences = PresenceStore::new(Arc::new(store));
    let sweeper = PresenceSweeper::from_config(presences, &config);

    if matches.get_flag("once") {
        let report = sweeper.sweep_once(Utc::now()).await?;
        info!(
            "🧹 Single sweep done: {} stale, {} marked offline, {} failed",
            report.stale, report.marked_offline, report.failed
        );
        return Ok(());
    }

    info!("🎯 Starting presence sweeper...");
    let handle = sweeper.start();

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutdown signal received, stopping sweeper");
    handle.stop().await;

    Ok(())
}
