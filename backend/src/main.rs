use std::sync::Arc;

use locator::{
    create_router,
    db::{migrations::run_migrations, DatabaseConfig, PgStore, SharedStore},
    services::{PresenceStore, PresenceSweeper},
    utils, AppState, Config,
};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    utils::init_logging();

    let config = Config::from_env()?;
    let db_config = DatabaseConfig::from_env()?;
    let store = PgStore::connect(&db_config).await?;

    run_migrations(store.pool()).await?;

    let store: SharedStore = Arc::new(store);

    let sweeper = if config.run_sweeper {
        Some(PresenceSweeper::from_config(PresenceStore::new(store.clone()), &config).start())
    } else {
        info!("RUN_SWEEPER is off, presence sweeping is left to a separate process");
        None
    };

    let app = create_router(AppState::new(store), config.allowed_origins.as_deref());

    let listener = tokio::net::TcpListener::bind(&format!("0.0.0.0:{}", config.port)).await?;
    info!("Server running on port {}", config.port);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(sweeper) = sweeper {
        sweeper.stop().await;
    }
    info!("Server stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        // Keep serving rather than exiting on a broken signal handler.
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
