//! Device fingerprinting and trust management
//!
//! A fingerprint is a SHA-256 hash over a few request headers plus the
//! browser and OS parsed from the user agent. Each successful login is
//! matched against the user's stored devices; unknown devices trigger an
//! audit event and an alert to the account owner.

pub mod fingerprint;
pub mod service;
pub mod storage;
pub mod user_agent;

use serde::{Deserialize, Serialize};

use crate::signals::SignalHeaders;

pub use fingerprint::{fingerprint_hash, DeviceFingerprint};
pub use service::{generate_confirmation_token, DeviceFingerprintEngine, DeviceLogin};
pub use storage::{DeviceRepository, MemoryDeviceRepository};
pub use user_agent::{Browser, DeviceType, OperatingSystem, ParsedUserAgent};

#[cfg(feature = "database")]
pub use storage::PgDeviceRepository;

/// Fingerprint configuration
///
/// # Example (config.toml)
///
/// ```toml
/// [fingerprint.headers]
/// forwarded_for = "cf-connecting-ip"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FingerprintConfig {
    /// Header names the request signals are read from
    #[serde(default)]
    pub headers: SignalHeaders,
}
