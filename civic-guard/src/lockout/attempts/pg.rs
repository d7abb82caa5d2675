//! PostgreSQL login attempt repository

use async_trait::async_trait;
use sqlx::PgPool;

use super::{LoginAttempt, LoginAttemptRepository};
use crate::error::{Error, Result};

/// PostgreSQL-backed login attempt log
#[derive(Debug, Clone)]
pub struct PgAttemptRepository {
    pool: PgPool,
}

impl PgAttemptRepository {
    /// Create a new repository over `pool`
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the `login_attempts` table and its lookup index
    pub async fn initialize(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS login_attempts (
                id UUID PRIMARY KEY,
                email TEXT NOT NULL,
                ip_address TEXT NOT NULL,
                attempt_time TIMESTAMPTZ NOT NULL,
                successful BOOLEAN NOT NULL,
                user_agent TEXT,
                location TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to create login_attempts table: {}", e)))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_login_attempts_email_time \
             ON login_attempts (email, attempt_time DESC)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to create login_attempts index: {}", e)))?;

        Ok(())
    }
}

#[async_trait]
impl LoginAttemptRepository for PgAttemptRepository {
    async fn append(&self, attempt: &LoginAttempt) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO login_attempts (
                id, email, ip_address, attempt_time, successful, user_agent, location
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(attempt.id)
        .bind(&attempt.email)
        .bind(&attempt.ip_address)
        .bind(attempt.attempt_time)
        .bind(attempt.successful)
        .bind(&attempt.user_agent)
        .bind(&attempt.location)
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to record login attempt: {}", e)))?;

        Ok(())
    }

    async fn recent_for_email(&self, email: &str, limit: usize) -> Result<Vec<LoginAttempt>> {
        let rows = sqlx::query_as::<_, LoginAttemptRow>(
            "SELECT id, email, ip_address, attempt_time, successful, user_agent, location \
             FROM login_attempts WHERE email = $1 ORDER BY attempt_time DESC LIMIT $2",
        )
        .bind(email)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to load login attempts: {}", e)))?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}

#[derive(sqlx::FromRow)]
struct LoginAttemptRow {
    id: uuid::Uuid,
    email: String,
    ip_address: String,
    attempt_time: chrono::DateTime<chrono::Utc>,
    successful: bool,
    user_agent: Option<String>,
    location: Option<String>,
}

impl From<LoginAttemptRow> for LoginAttempt {
    fn from(row: LoginAttemptRow) -> Self {
        Self {
            id: row.id,
            email: row.email,
            ip_address: row.ip_address,
            attempt_time: row.attempt_time,
            successful: row.successful,
            user_agent: row.user_agent,
            location: row.location,
        }
    }
}
