//! Append-only record of login attempts
//!
//! The guard writes one row per attempt through an [`AttemptRecorder`]. Nothing on the login path reads
//! these rows back; they exist for reporting and investigation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;

pub mod memory;
pub mod recorder;

#[cfg(feature = "database")]
pub mod pg;

pub use memory::MemoryAttemptRepository;
pub use recorder::AttemptRecorder;

#[cfg(feature = "database")]
pub use pg::PgAttemptRepository;

/// One login attempt, successful or not
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginAttempt {
    /// Unique row identifier
    pub id: Uuid,
    /// Normalized login identifier
    pub email: String,
    /// Client address
    pub ip_address: String,
    /// When the attempt was made
    pub attempt_time: DateTime<Utc>,
    /// Whether the credentials were accepted
    pub successful: bool,
    /// Client user agent
    pub user_agent: Option<String>,
    /// Resolved client location
    pub location: Option<String>,
}

impl LoginAttempt {
    /// New attempt stamped with the current time
    pub fn new(email: impl Into<String>, ip_address: impl Into<String>, successful: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            email: email.into(),
            ip_address: ip_address.into(),
            attempt_time: Utc::now(),
            successful,
            user_agent: None,
            location: None,
        }
    }
}

/// Persistence for [`LoginAttempt`] rows
#[async_trait]
pub trait LoginAttemptRepository: Send + Sync {
    /// Append one attempt
    async fn append(&self, attempt: &LoginAttempt) -> Result<()>;

    /// Up to `limit` most recent attempts for `email`, newest first
    async fn recent_for_email(&self, email: &str, limit: usize) -> Result<Vec<LoginAttempt>>;
}
