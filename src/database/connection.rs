//! Database connection management

use std::time::Duration;

use sqlx::{Pool, Postgres};

use crate::config::settings::DatabaseConfig;
use crate::utils::errors::ClubError;

pub type DatabasePool = Pool<Postgres>;

/// Create a new database connection pool
pub async fn create_pool(config: &DatabaseConfig) -> Result<DatabasePool, ClubError> {
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_seconds))
        .idle_timeout(Some(Duration::from_secs(600)))
        .max_lifetime(Some(Duration::from_secs(1800)))
        .connect(&config.url)
        .await
        .map_err(super::StoreError::from)?;

    health_check(&pool).await?;

    tracing::info!("Database connection pool created successfully");
    Ok(pool)
}

/// Run database migrations
pub async fn run_migrations(pool: &DatabasePool) -> Result<(), ClubError> {
    tracing::info!("Running database migrations...");

    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| super::StoreError::Unavailable(format!("migration failed: {}", e)))?;

    tracing::info!("Database migrations completed successfully");
    Ok(())
}

/// Check database health
pub async fn health_check(pool: &DatabasePool) -> Result<(), ClubError> {
    sqlx::query("SELECT 1")
        .execute(pool)
        .await
        .map_err(super::StoreError::from)?;

    Ok(())
}
