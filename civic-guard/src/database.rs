//! Database connection pool management

use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;

use crate::{
    config::DatabaseConfig,
    error::{Error, Result},
};

/// Create a PostgreSQL connection pool with retry logic
///
/// Same retry policy as the Redis pool: exponential backoff from
/// `retry_delay_secs`, `max_retries` extra attempts.
pub async fn create_pool(config: &DatabaseConfig) -> Result<PgPool> {
    let mut attempt = 0;
    let base_delay = Duration::from_secs(config.retry_delay_secs);

    loop {
        match try_create_pool(config).await {
            Ok(pool) => {
                if attempt > 0 {
                    tracing::info!(attempts = attempt + 1, "Database connection established");
                } else {
                    tracing::info!(
                        max = config.max_connections,
                        min = config.min_connections,
                        "Database connection pool created"
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
                        "Failed to connect to database"
                    );
                    return Err(e);
                }

                let delay = base_delay * 2_u32.pow(attempt.saturating_sub(1).min(16));
                tracing::warn!(
                    attempt,
                    error = %e,
                    "Database connection attempt failed. Retrying in {:?}...",
                    delay
                );

                tokio::time::sleep(delay).await;
            }
        }
    }
}

/// Attempt to create a database pool (single try)
async fn try_create_pool(config: &DatabaseConfig) -> Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(config.connection_timeout())
        .connect(&config.url)
        .await
        .map_err(|e| {
            Error::Database(format!(
                "Failed to connect to database at '{}' ({}): {}",
                sanitize_connection_url(&config.url),
                categorize_db_error(&e),
                e
            ))
        })
}

/// Sanitize connection URL for safe logging (remove password)
fn sanitize_connection_url(url: &str) -> String {
    if let (Some(scheme_end), Some(at_pos)) = (url.find("://"), url.rfind('@')) {
        let credentials = &url[scheme_end + 3..at_pos];
        if let Some(colon_pos) = credentials.find(':') {
            return format!(
                "{}{}:***{}",
                &url[..scheme_end + 3],
                &credentials[..colon_pos],
                &url[at_pos..]
            );
        }
    }
    url.to_string()
}

/// Categorize database error for better operator guidance
fn categorize_db_error(err: &sqlx::Error) -> &'static str {
    use sqlx::Error;
    match err {
        Error::Configuration(_) => "configuration error",
        Error::Database(_) => "database error",
        Error::Io(_) => "network I/O error, check connectivity",
        Error::Tls(_) => "TLS error, check certificate configuration",
        Error::PoolTimedOut => "pool timeout, database may be overloaded",
        Error::PoolClosed => "pool closed",
        _ => "connection error",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_connection_url() {
        assert_eq!(
            sanitize_connection_url("postgres://civic:s3cret@db:5432/civic"),
            "postgres://civic:***@db:5432/civic"
        );
        assert_eq!(
            sanitize_connection_url("postgres://db:5432/civic"),
            "postgres://db:5432/civic"
        );
    }
}
