//! Redis connection pool management

use deadpool_redis::{Config as DeadpoolConfig, Pool, Runtime};
use std::time::Duration;

use crate::{
    config::RedisConfig,
    error::{Error, Result},
};

/// Create a Redis connection pool with retry logic
///
/// Retries with exponential backoff starting at `retry_delay_secs`, up to
/// `max_retries` extra attempts. Each attempt checks out one connection so a
/// wrong URL fails here rather than on the first login.
pub async fn create_pool(config: &RedisConfig) -> Result<Pool> {
    let mut attempt = 0;
    let base_delay = Duration::from_secs(config.retry_delay_secs);

    loop {
        match try_create_pool(config).await {
            Ok(pool) => {
                if attempt > 0 {
                    tracing::info!(attempts = attempt + 1, "Redis connection established");
                } else {
                    tracing::info!(
                        max_connections = config.max_connections,
                        "Redis connection pool created"
                    );
                }
                return Ok(pool);
            }
            Err(e) => {
                attempt += 1;

                if attempt > config.max_retries {
                    tracing::error!(
                        attempts = config.max_retries + 1,
                        error = %e,
                        "Failed to connect to Redis"
                    );
                    return Err(e);
                }

                let delay = backoff(base_delay, attempt);
                tracing::warn!(
                    attempt,
                    error = %e,
                    "Redis connection attempt failed. Retrying in {:?}...",
                    delay
                );

                tokio::time::sleep(delay).await;
            }
        }
    }
}

/// Delay before retry number `attempt` (1-based)
pub(crate) fn backoff(base: Duration, attempt: u32) -> Duration {
    base * 2_u32.pow(attempt.saturating_sub(1).min(16))
}

/// Attempt to create a Redis pool (single try)
async fn try_create_pool(config: &RedisConfig) -> Result<Pool> {
    let pool = DeadpoolConfig::from_url(&config.url)
        .builder()
        .map_err(|e| Error::Store(format!("Failed to build Redis pool: {}", e)))?
        .max_size(config.max_connections)
        .wait_timeout(Some(config.connection_timeout()))
        .create_timeout(Some(config.connection_timeout()))
        .runtime(Runtime::Tokio1)
        .build()
        .map_err(|e| Error::Store(format!("Failed to create Redis pool: {}", e)))?;

    let conn = pool
        .get()
        .await
        .map_err(|e| Error::Store(format!("Failed to get Redis connection: {}", e)))?;
    drop(conn);

    Ok(pool)
}
