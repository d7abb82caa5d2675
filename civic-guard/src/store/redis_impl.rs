//! Redis-backed ephemeral store
//!
//! Counters are incremented inside a `MULTI`/`EXEC` block together with the
//! `PEXPIRE` that slides the window, so the increment and the TTL refresh are
//! one atomic unit on the server. Lock flags use `SET NX PX`.

use std::ops::DerefMut;
use std::time::Duration;

use async_trait::async_trait;
use deadpool_redis::Pool as RedisPool;

use super::EphemeralStore;
use crate::error::{Error, Result};

/// Shared [`EphemeralStore`] backed by a Redis connection pool
#[derive(Clone)]
pub struct RedisStore {
    pool: RedisPool,
}

impl RedisStore {
    /// Create a store on top of an existing pool
    pub fn new(pool: RedisPool) -> Self {
        Self { pool }
    }

    /// Get a Redis connection from the pool
    async fn get_connection(&self) -> Result<deadpool_redis::Connection> {
        self.pool.get().await.map_err(|e| {
            tracing::error!(error = %e, "Failed to get Redis connection for lockout store");
            Error::Store(format!("Failed to get Redis connection: {}", e))
        })
    }
}

fn ttl_millis(ttl: Duration) -> u64 {
    // PX/PEXPIRE reject 0
    (ttl.as_millis() as u64).max(1)
}

fn store_error(op: &str, err: redis::RedisError) -> Error {
    tracing::error!(operation = op, error = %err, "Redis lockout store command failed");
    Error::Store(format!("Redis {} failed: {}", op, err))
}

#[async_trait]
impl EphemeralStore for RedisStore {
    async fn increment_with_ttl(&self, key: &str, ttl: Duration) -> Result<u64> {
        let mut conn = self.get_connection().await?;

        let (count,): (u64,) = redis::pipe()
            .atomic()
            .cmd("INCR")
            .arg(key)
            .cmd("PEXPIRE")
            .arg(key)
            .arg(ttl_millis(ttl))
            .ignore()
            .query_async(conn.deref_mut())
            .await
            .map_err(|e| store_error("INCR", e))?;

        Ok(count)
    }

    async fn set_if_absent_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<bool> {
        let mut conn = self.get_connection().await?;

        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("PX")
            .arg(ttl_millis(ttl))
            .query_async(conn.deref_mut())
            .await
            .map_err(|e| store_error("SET NX", e))?;

        Ok(reply.is_some())
    }

    async fn get_counter(&self, key: &str) -> Result<Option<u64>> {
        let mut conn = self.get_connection().await?;

        let count: Option<u64> = redis::cmd("GET")
            .arg(key)
            .query_async(conn.deref_mut())
            .await
            .map_err(|e| store_error("GET", e))?;

        Ok(count)
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.get_connection().await?;

        let value: Option<String> = redis::cmd("GET")
            .arg(key)
            .query_async(conn.deref_mut())
            .await
            .map_err(|e| store_error("GET", e))?;

        Ok(value)
    }

    async fn ttl_remaining(&self, key: &str) -> Result<Option<Duration>> {
        let mut conn = self.get_connection().await?;

        // -2: missing key, -1: key without expiry
        let pttl: i64 = redis::cmd("PTTL")
            .arg(key)
            .query_async(conn.deref_mut())
            .await
            .map_err(|e| store_error("PTTL", e))?;

        Ok(match pttl {
            ms if ms > 0 => Some(Duration::from_millis(ms as u64)),
            -1 => Some(Duration::MAX),
            _ => None,
        })
    }

    async fn delete(&self, keys: &[&str]) -> Result<()> {
        if keys.is_empty() {
            return Ok(());
        }

        let mut conn = self.get_connection().await?;

        let mut cmd = redis::cmd("DEL");
        for key in keys {
            cmd.arg(*key);
        }
        let _: () = cmd
            .query_async(conn.deref_mut())
            .await
            .map_err(|e| store_error("DEL", e))?;

        Ok(())
    }
}
