//! Append-only security audit log
//!
//! The lockout guard and the device engine record every security-relevant
//! decision here. Writes are fire-and-forget and never fail the caller; a
//! single background worker persists them in enqueue order.
//!
//! # Backends
//!
//! - `MemoryAuditStorage`: always available
//! - `PgAuditStorage` (`database` feature): append-only table with
//!   `CREATE RULE` guards against UPDATE/DELETE

pub mod config;
pub mod event;
pub mod logger;
pub mod storage;

pub use config::AuditConfig;
pub use event::{SecurityAuditEvent, SecurityEventType};
pub use logger::SecurityAuditLog;
pub use storage::{AuditQuery, MemoryAuditStorage, SecurityAuditStorage};

#[cfg(feature = "database")]
pub use storage::PgAuditStorage;
