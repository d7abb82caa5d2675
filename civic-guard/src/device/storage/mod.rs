//! Device fingerprint persistence
//!
//! # Available Backends
//!
//! - [`MemoryDeviceRepository`]: `DashMap` keyed by fingerprint hash
//! - **PostgreSQL** (`database` feature): `INSERT ... ON CONFLICT` upsert

use async_trait::async_trait;

use super::fingerprint::DeviceFingerprint;
use crate::error::Result;

pub mod memory;

#[cfg(feature = "database")]
pub mod pg;

pub use memory::MemoryDeviceRepository;

#[cfg(feature = "database")]
pub use pg::PgDeviceRepository;

/// Storage for [`DeviceFingerprint`] rows, unique on `fingerprint_hash`
#[async_trait]
pub trait DeviceRepository: Send + Sync {
    /// The row with `fingerprint_hash` owned by `user_id`
    async fn find(&self, user_id: &str, fingerprint_hash: &str) -> Result<Option<DeviceFingerprint>>;

    /// Insert `device`, or refresh `last_seen` and `ip_address` of the row
    /// that already holds its hash
    ///
    /// A single atomic operation. Owner, trust flag and `first_seen` of an
    /// existing row are left untouched. Returns the stored row.
    async fn upsert(&self, device: &DeviceFingerprint) -> Result<DeviceFingerprint>;

    /// All devices owned by `user_id`, most recently seen first
    async fn list_for_user(&self, user_id: &str) -> Result<Vec<DeviceFingerprint>>;

    /// Set the trust flag on a row owned by `user_id`
    ///
    /// Returns `false` when no such row exists or it belongs to someone
    /// else; nothing is changed in that case.
    async fn set_trusted(&self, user_id: &str, fingerprint_hash: &str, trusted: bool) -> Result<bool>;
}
