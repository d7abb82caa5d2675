//! # civic-guard
//!
//! Brute-force protection and device trust for the civic services login
//! endpoint.
//!
//! ## Features
//!
//! - **Login lockout**: sliding-window failed-attempt counter, time-bounded
//!   lock, warning before the last attempts
//! - **Device fingerprints**: per-user device registry, trust flags and
//!   new-device alerts
//! - **Security audit log**: append-only event log written by a background
//!   worker, with filtered reads for reporting
//! - **Notifications**: account-locked and new-device alerts via tracing or
//!   webhooks
//! - **Backends**: Redis (`cache`) for counters and locks, PostgreSQL
//!   (`database`) for attempts, devices and audit events, in-memory for both
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use civic_guard::prelude::*;
//!
//! struct Users;
//!
//! #[async_trait::async_trait]
//! impl CredentialVerifier for Users {
//!     async fn verify(&self, identifier: &str, secret: &str) -> Result<Option<VerifiedUser>> {
//!         Ok((secret == "correct horse").then(|| VerifiedUser {
//!             id: "1".to_string(),
//!             email: identifier.to_string(),
//!         }))
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let services = SecurityServices::builder()
//!         .config(Config::load()?)
//!         .verifier(Arc::new(Users))
//!         .build()
//!         .await?;
//!
//!     let signals = RequestSignals::default().with_user_agent("Mozilla/5.0");
//!     match services.login().authenticate("resident@example.org", "hunter2", &signals).await {
//!         Ok(outcome) => println!("welcome {}", outcome.user.id),
//!         Err(e) => println!("{}", e.user_message()),
//!     }
//!
//!     services.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod audit;
pub mod config;
pub mod device;
pub mod error;
pub mod geo;
pub mod lockout;
pub mod login;
pub mod notification;
pub mod observability;
pub mod pagination;
pub mod services;
pub mod signals;
pub mod store;

#[cfg(feature = "cache")]
pub mod cache;

#[cfg(feature = "database")]
pub mod database;

#[cfg(test)]
pub(crate) mod test_support;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::audit::{
        AuditConfig, AuditQuery, SecurityAuditEvent, SecurityAuditLog, SecurityAuditStorage,
        SecurityEventType,
    };
    pub use crate::config::Config;
    pub use crate::device::{DeviceFingerprint, DeviceFingerprintEngine, DeviceLogin, DeviceRepository};
    pub use crate::error::{Error, Result};
    pub use crate::geo::{LocationResolver, StubLocationResolver};
    pub use crate::lockout::{
        AttemptContext, AttemptStatus, LockoutConfig, LoginAttemptGuard, LOCK_DURATION_MINUTES,
        MAX_ATTEMPTS,
    };
    pub use crate::login::{CredentialVerifier, LoginFlow, LoginOutcome, VerifiedUser};
    pub use crate::notification::{
        AccountLockedAlert, NewDeviceAlert, NotificationDispatcher, SecurityNotifier,
    };
    pub use crate::observability::init_tracing;
    pub use crate::pagination::Pagination;
    pub use crate::services::{SecurityServices, SecurityServicesBuilder};
    pub use crate::signals::RequestSignals;
    pub use crate::store::{EphemeralStore, MemoryStore};

    #[cfg(feature = "cache")]
    pub use crate::store::RedisStore;
}

pub use error::{Error, Result};
