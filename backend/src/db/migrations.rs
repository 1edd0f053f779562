use anyhow::{Context, Result};
use sqlx::PgPool;

/// Applies the embedded `backend/migrations` directory.
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("failed to apply locator migrations")?;
    tracing::info!("Database migrations are up to date");
    Ok(())
}
