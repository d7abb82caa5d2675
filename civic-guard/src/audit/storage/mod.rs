//! Security audit storage trait and backend implementations
//!
//! Audit records are append-only: there is no update or delete in the trait,
//! and the PostgreSQL backend enforces the same at the database level.
//!
//! # Available Backends
//!
//! - [`MemoryAuditStorage`]: process-local, for tests and single-node setups
//! - **PostgreSQL** (`database` feature): `CREATE RULE` discards UPDATE/DELETE

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::event::{SecurityAuditEvent, SecurityEventType};
use crate::error::Result;
use crate::pagination::Pagination;

pub mod memory;

#[cfg(feature = "database")]
pub mod pg;

pub use memory::MemoryAuditStorage;

#[cfg(feature = "database")]
pub use pg::PgAuditStorage;

/// Filter for audit reads
///
/// Every populated field narrows the result; an empty query matches all
/// events.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuditQuery {
    /// Exact subject match
    pub user_id: Option<String>,
    /// Any of these types; empty means all types
    pub event_types: Vec<SecurityEventType>,
    /// Exact client IP match
    pub ip_address: Option<String>,
    /// Inclusive lower bound on `timestamp`
    pub from: Option<DateTime<Utc>>,
    /// Inclusive upper bound on `timestamp`
    pub to: Option<DateTime<Utc>>,
}

impl AuditQuery {
    /// Events about one subject
    pub fn for_user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            ..Self::default()
        }
    }

    /// Events from one client address
    pub fn for_ip(ip: impl Into<String>) -> Self {
        Self {
            ip_address: Some(ip.into()),
            ..Self::default()
        }
    }

    /// Events of the given types
    pub fn of_types(types: impl IntoIterator<Item = SecurityEventType>) -> Self {
        Self {
            event_types: types.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Restrict to `[from, to]`
    pub fn between(mut self, from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        self.from = Some(from);
        self.to = Some(to);
        self
    }

    /// Restrict to events at or after `from`
    pub fn since(mut self, from: DateTime<Utc>) -> Self {
        self.from = Some(from);
        self
    }

    /// Whether `event` satisfies every populated field
    pub fn matches(&self, event: &SecurityAuditEvent) -> bool {
        if let Some(ref user_id) = self.user_id {
            if event.user_id.as_deref() != Some(user_id.as_str()) {
                return false;
            }
        }
        if !self.event_types.is_empty() && !self.event_types.contains(&event.event_type) {
            return false;
        }
        if let Some(ref ip) = self.ip_address {
            if event.ip_address.as_deref() != Some(ip.as_str()) {
                return false;
            }
        }
        if self.from.is_some_and(|from| event.timestamp < from) {
            return false;
        }
        if self.to.is_some_and(|to| event.timestamp > to) {
            return false;
        }
        true
    }
}

/// Persistence backend for security audit events
#[async_trait]
pub trait SecurityAuditStorage: Send + Sync {
    /// Append one event
    async fn append(&self, event: &SecurityAuditEvent) -> Result<()>;

    /// Events matching `query`, newest first
    ///
    /// Events with equal timestamps come back in reverse append order.
    async fn query(&self, query: &AuditQuery, page: Pagination) -> Result<Vec<SecurityAuditEvent>>;
}
