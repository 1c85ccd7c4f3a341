//! Database connection pool management

use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;

use crate::config::DatabaseConfig;
use crate::error::{sanitize_url, DatabaseError, DatabaseOperation, Result};

/// Create a PostgreSQL connection pool, retrying with exponential backoff
///
/// Applies the embedded migrations when `run_migrations` is set.
pub async fn create_pool(config: &DatabaseConfig) -> Result<PgPool> {
    let mut attempt = 0;

    let pool = loop {
        match try_create_pool(config).await {
            Ok(pool) => {
                tracing::info!(
                    attempts = attempt + 1,
                    max_connections = config.max_connections,
                    min_connections = config.min_connections,
                    "Database connection pool created"
                );
                break pool;
            }
            Err(e) => {
                attempt += 1;

                if attempt > config.max_retries || !e.is_retriable() {
                    tracing::error!(
                        url = %sanitize_url(&config.url),
                        attempts = attempt,
                        "Failed to connect to database: {}",
                        e
                    );
                    return Err(e.into());
                }

                let delay = backoff_delay(config.retry_delay_secs, attempt);
                tracing::warn!(
                    "Database connection attempt {} failed: {}. Retrying in {:?}...",
                    attempt,
                    e,
                    delay
                );

                tokio::time::sleep(delay).await;
            }
        }
    };

    if config.run_migrations {
        run_migrations(&pool).await?;
    }

    Ok(pool)
}

/// Apply the migrations under `migrations/`
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| DatabaseError::from(sqlx::Error::from(e)).during(DatabaseOperation::Migration))?;

    tracing::info!("Database migrations applied");
    Ok(())
}

async fn try_create_pool(config: &DatabaseConfig) -> std::result::Result<PgPool, DatabaseError> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.connection_timeout_secs))
        .connect(&config.url)
        .await
        .map_err(|e| {
            DatabaseError::from(e)
                .during(DatabaseOperation::Connect)
                .add_context(sanitize_url(&config.url))
        })
}

/// Delay before retry number `attempt` (1-based): `base * 2^(attempt - 1)`
fn backoff_delay(base_secs: u64, attempt: u32) -> Duration {
    let multiplier = 2_u64.saturating_pow(attempt.saturating_sub(1));
    Duration::from_secs(base_secs.saturating_mul(multiplier))
}
