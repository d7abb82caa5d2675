//! Ephemeral key-value store for attempt counters and lock flags
//!
//! The lockout guard never reads or writes its state through anything but
//! this trait. Every mutation is a single atomic operation on the backend;
//! there is no read-then-write anywhere on the hot path.
//!
//! # Available Backends
//!
//! - [`MemoryStore`]: process-local, `DashMap` entry locking
//! - [`RedisStore`] (`cache` feature): shared across instances

use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;

pub mod memory;

#[cfg(feature = "cache")]
pub mod redis_impl;

pub use memory::MemoryStore;

#[cfg(feature = "cache")]
pub use redis_impl::RedisStore;

/// Atomic key-value primitives with per-key expiry
///
/// Expired keys behave exactly like absent keys. Implementations must map
/// connectivity failures to [`Error::Store`](crate::error::Error::Store) so
/// the guard can fail closed.
#[async_trait]
pub trait EphemeralStore: Send + Sync + 'static {
    /// Increment the counter at `key` and return the new value
    ///
    /// The TTL is reset to `ttl` on every call. A missing or expired key
    /// starts again from zero.
    async fn increment_with_ttl(&self, key: &str, ttl: Duration) -> Result<u64>;

    /// Create `key` with `value` unless it already exists
    ///
    /// Returns `true` iff this call created the key.
    async fn set_if_absent_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<bool>;

    /// Read a counter, `None` when absent or expired
    async fn get_counter(&self, key: &str) -> Result<Option<u64>>;

    /// Read a string value, `None` when absent or expired
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Remaining lifetime of `key`, `None` when absent or expired
    async fn ttl_remaining(&self, key: &str) -> Result<Option<Duration>>;

    /// Delete every key in `keys`; missing keys are ignored
    async fn delete(&self, keys: &[&str]) -> Result<()>;
}
