//! PostgreSQL device fingerprint repository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::DeviceRepository;
use crate::device::fingerprint::DeviceFingerprint;
use crate::error::{Error, Result};

const COLUMNS: &str = "id, user_id, fingerprint_hash, browser_type, operating_system, \
                       device_type, ip_address, first_seen, last_seen, trusted";

/// PostgreSQL-backed device repository
#[derive(Debug, Clone)]
pub struct PgDeviceRepository {
    pool: PgPool,
}

impl PgDeviceRepository {
    /// Create a new repository over `pool`
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the `device_fingerprints` table
    pub async fn initialize(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS device_fingerprints (
                id UUID PRIMARY KEY,
                user_id TEXT NOT NULL,
                fingerprint_hash TEXT NOT NULL UNIQUE,
                browser_type TEXT NOT NULL,
                operating_system TEXT NOT NULL,
                device_type TEXT NOT NULL,
                ip_address TEXT NOT NULL,
                first_seen TIMESTAMPTZ NOT NULL,
                last_seen TIMESTAMPTZ NOT NULL,
                trusted BOOLEAN NOT NULL DEFAULT FALSE
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to create device_fingerprints table: {}", e)))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_device_fingerprints_user \
             ON device_fingerprints (user_id, last_seen DESC)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to create device_fingerprints index: {}", e)))?;

        Ok(())
    }
}

#[async_trait]
impl DeviceRepository for PgDeviceRepository {
    async fn find(&self, user_id: &str, fingerprint_hash: &str) -> Result<Option<DeviceFingerprint>> {
        let row = sqlx::query_as::<_, DeviceRow>(&format!(
            "SELECT {} FROM device_fingerprints WHERE user_id = $1 AND fingerprint_hash = $2",
            COLUMNS
        ))
        .bind(user_id)
        .bind(fingerprint_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to look up device: {}", e)))?;

        Ok(row.map(Into::into))
    }

    async fn upsert(&self, device: &DeviceFingerprint) -> Result<DeviceFingerprint> {
        let row = sqlx::query_as::<_, DeviceRow>(&format!(
            r#"
            INSERT INTO device_fingerprints ({})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (fingerprint_hash) DO UPDATE
                SET last_seen = EXCLUDED.last_seen,
                    ip_address = EXCLUDED.ip_address
            RETURNING {}
            "#,
            COLUMNS, COLUMNS
        ))
        .bind(device.id)
        .bind(&device.user_id)
        .bind(&device.fingerprint_hash)
        .bind(&device.browser_type)
        .bind(&device.operating_system)
        .bind(&device.device_type)
        .bind(&device.ip_address)
        .bind(device.first_seen)
        .bind(device.last_seen)
        .bind(device.trusted)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to register device: {}", e)))?;

        Ok(row.into())
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<DeviceFingerprint>> {
        let rows = sqlx::query_as::<_, DeviceRow>(&format!(
            "SELECT {} FROM device_fingerprints WHERE user_id = $1 ORDER BY last_seen DESC",
            COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to list devices: {}", e)))?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn set_trusted(&self, user_id: &str, fingerprint_hash: &str, trusted: bool) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE device_fingerprints SET trusted = $3 WHERE user_id = $1 AND fingerprint_hash = $2",
        )
        .bind(user_id)
        .bind(fingerprint_hash)
        .bind(trusted)
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to update device trust: {}", e)))?;

        Ok(result.rows_affected() > 0)
    }
}

#[derive(sqlx::FromRow)]
struct DeviceRow {
    id: uuid::Uuid,
    user_id: String,
    fingerprint_hash: String,
    browser_type: String,
    operating_system: String,
    device_type: String,
    ip_address: String,
    first_seen: DateTime<Utc>,
    last_seen: DateTime<Utc>,
    trusted: bool,
}

impl From<DeviceRow> for DeviceFingerprint {
    fn from(row: DeviceRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            fingerprint_hash: row.fingerprint_hash,
            browser_type: row.browser_type,
            operating_system: row.operating_system,
            device_type: row.device_type,
            ip_address: row.ip_address,
            first_seen: row.first_seen,
            last_seen: row.last_seen,
            trusted: row.trusted,
        }
    }
}
