//! PostgreSQL security audit storage
//!
//! Enforces immutability using `CREATE RULE` to silently discard UPDATE/DELETE
//! operations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};

use super::{AuditQuery, SecurityAuditStorage};
use crate::audit::event::{SecurityAuditEvent, SecurityEventType};
use crate::error::{Error, Result};
use crate::pagination::Pagination;

/// PostgreSQL-backed audit storage
#[derive(Debug, Clone)]
pub struct PgAuditStorage {
    pool: PgPool,
}

impl PgAuditStorage {
    /// Create a new PostgreSQL audit storage
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the `security_audit_events` table, its indexes and the
    /// immutability rules
    ///
    /// Idempotent; call once during startup.
    pub async fn initialize(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS security_audit_events (
                seq BIGSERIAL UNIQUE,
                id UUID PRIMARY KEY,
                user_id TEXT,
                event_type TEXT NOT NULL,
                ip_address TEXT,
                timestamp TIMESTAMPTZ NOT NULL,
                details JSONB NOT NULL DEFAULT '{}'::jsonb,
                user_agent TEXT,
                location TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to create security_audit_events table: {}", e)))?;

        for (name, column) in [
            ("idx_security_audit_user", "user_id"),
            ("idx_security_audit_type", "event_type"),
            ("idx_security_audit_ip", "ip_address"),
            ("idx_security_audit_timestamp", "timestamp"),
        ] {
            sqlx::query(&format!(
                "CREATE INDEX IF NOT EXISTS {} ON security_audit_events ({})",
                name, column
            ))
            .execute(&self.pool)
            .await
            .map_err(|e| Error::Database(format!("Failed to create index {}: {}", name, e)))?;
        }

        sqlx::query(
            r#"
            DO $$
            BEGIN
                IF NOT EXISTS (
                    SELECT 1 FROM pg_rules
                    WHERE rulename = 'security_audit_no_update'
                      AND tablename = 'security_audit_events'
                ) THEN
                    CREATE RULE security_audit_no_update AS
                        ON UPDATE TO security_audit_events DO INSTEAD NOTHING;
                END IF;

                IF NOT EXISTS (
                    SELECT 1 FROM pg_rules
                    WHERE rulename = 'security_audit_no_delete'
                      AND tablename = 'security_audit_events'
                ) THEN
                    CREATE RULE security_audit_no_delete AS
                        ON DELETE TO security_audit_events DO INSTEAD NOTHING;
                END IF;
            END
            $$;
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to create audit immutability rules: {}", e)))?;

        Ok(())
    }
}

#[async_trait]
impl SecurityAuditStorage for PgAuditStorage {
    async fn append(&self, event: &SecurityAuditEvent) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO security_audit_events (
                id, user_id, event_type, ip_address, timestamp, details, user_agent, location
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(event.id)
        .bind(&event.user_id)
        .bind(event.event_type.as_str())
        .bind(&event.ip_address)
        .bind(event.timestamp)
        .bind(&event.details)
        .bind(&event.user_agent)
        .bind(&event.location)
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to append security audit event: {}", e)))?;

        Ok(())
    }

    async fn query(&self, query: &AuditQuery, page: Pagination) -> Result<Vec<SecurityAuditEvent>> {
        let mut builder = QueryBuilder::<Postgres>::new(
            "SELECT id, user_id, event_type, ip_address, timestamp, details, user_agent, location \
             FROM security_audit_events WHERE TRUE",
        );

        if let Some(ref user_id) = query.user_id {
            builder.push(" AND user_id = ").push_bind(user_id.clone());
        }
        if !query.event_types.is_empty() {
            let types: Vec<String> = query
                .event_types
                .iter()
                .map(|t| t.as_str().to_string())
                .collect();
            builder.push(" AND event_type = ANY(").push_bind(types).push(")");
        }
        if let Some(ref ip) = query.ip_address {
            builder.push(" AND ip_address = ").push_bind(ip.clone());
        }
        if let Some(from) = query.from {
            builder.push(" AND timestamp >= ").push_bind(from);
        }
        if let Some(to) = query.to {
            builder.push(" AND timestamp <= ").push_bind(to);
        }

        builder
            .push(" ORDER BY timestamp DESC, seq DESC LIMIT ")
            .push_bind(i64::try_from(page.limit).unwrap_or(i64::MAX))
            .push(" OFFSET ")
            .push_bind(i64::try_from(page.offset).unwrap_or(i64::MAX));

        let rows = builder
            .build_query_as::<SecurityAuditRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| Error::Database(format!("Failed to query security audit events: {}", e)))?;

        rows.into_iter().map(TryInto::try_into).collect()
    }
}

/// Internal row type for sqlx mapping
#[derive(sqlx::FromRow)]
struct SecurityAuditRow {
    id: uuid::Uuid,
    user_id: Option<String>,
    event_type: String,
    ip_address: Option<String>,
    timestamp: DateTime<Utc>,
    details: serde_json::Value,
    user_agent: Option<String>,
    location: Option<String>,
}

impl TryFrom<SecurityAuditRow> for SecurityAuditEvent {
    type Error = Error;

    fn try_from(row: SecurityAuditRow) -> Result<Self> {
        let event_type: SecurityEventType = row.event_type.parse()?;
        Ok(SecurityAuditEvent {
            id: row.id,
            user_id: row.user_id,
            event_type,
            ip_address: row.ip_address,
            timestamp: row.timestamp,
            details: row.details,
            user_agent: row.user_agent,
            location: row.location,
        })
    }
}
