//! Brute-force protection for the login endpoint
//!
//! Counts failed attempts per identifier in a sliding window and locks the
//! account for a fixed period once the threshold is reached. State lives in
//! an [`EphemeralStore`](crate::store::EphemeralStore) so every instance of
//! the service sees the same counters.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use civic_guard::lockout::{AttemptContext, LoginAttemptGuard};
//!
//! if guard.is_locked(&email).await? {
//!     /* refuse without checking the password */
//! }
//!
//! match verify(&email, &password).await {
//!     Ok(user) => guard.record_successful_attempt(&email, &ip, &ctx).await?,
//!     Err(_) => {
//!         let status = guard.record_failed_attempt(&email, &ip, &ctx).await?;
//!         if let Some(warning) = status.warning { /* show it */ }
//!     }
//! }
//! ```

pub mod attempts;
pub mod config;
pub mod service;
pub mod state;

pub use attempts::{AttemptRecorder, LoginAttempt, LoginAttemptRepository, MemoryAttemptRepository};
pub use config::{LockoutConfig, LOCK_DURATION_MINUTES, MAX_ATTEMPTS, WARNING_THRESHOLD};
pub use service::{warning_message, AttemptContext, AttemptStatus, LoginAttemptGuard};
pub use state::LockState;

#[cfg(feature = "database")]
pub use attempts::PgAttemptRepository;

/// Canonical form of a login identifier: trimmed and lower-cased
pub fn normalize_identifier(identifier: &str) -> String {
    identifier.trim().to_lowercase()
}
