//! Security notifications
//!
//! Alerts are raised when an account gets locked and when a user signs in from
//! a device not seen before. Delivery goes through [`NotificationDispatcher`],
//! which runs every [`SecurityNotifier`] in a spawned task so alerting never
//! blocks or fails a login.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub mod dispatcher;
pub mod tracing_notifier;
pub mod webhook;

pub use dispatcher::NotificationDispatcher;
pub use tracing_notifier::TracingNotifier;
pub use webhook::WebhookNotifier;

/// Sent to the account owner when the account gets locked
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountLockedAlert {
    /// Login identifier of the locked account
    pub email: String,
    /// Address the final failed attempt came from
    pub ip_address: String,
    /// Resolved location of that address
    pub location: String,
    /// When the lock was created
    pub locked_at: DateTime<Utc>,
    /// How long the lock lasts
    pub lock_duration_minutes: u64,
}

/// Sent to the account owner after a login from an unknown device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDeviceAlert {
    /// Account that signed in
    pub user_id: String,
    /// Address the alert is delivered to
    pub email: String,
    /// Desktop, Mobile or Tablet
    pub device_type: String,
    /// Parsed browser family
    pub browser: String,
    /// Parsed operating system
    pub operating_system: String,
    /// Client address
    pub ip_address: String,
    /// Resolved location
    pub location: String,
    /// When the login happened
    pub login_time: DateTime<Utc>,
    /// Opaque token the user can present to confirm the device
    pub confirmation_token: String,
}

/// Delivery channel for security alerts
///
/// Methods run inside a spawned task. Errors are logged by the dispatcher
/// and never reach the login caller.
#[async_trait]
pub trait SecurityNotifier: Send + Sync + 'static {
    /// Deliver an account-locked alert
    async fn send_account_locked_alert(&self, alert: &AccountLockedAlert) -> Result<()>;

    /// Deliver a new-device alert
    async fn send_new_device_alert(&self, alert: &NewDeviceAlert) -> Result<()>;

    /// Short name used in logs
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// Notification configuration
///
/// # Example (config.toml)
///
/// ```toml
/// [notification]
/// log_alerts = true
///
/// [[notification.webhooks]]
/// url = "https://alerts.example.org/security"
/// timeout_secs = 5
/// headers = { Authorization = "Bearer secret" }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Register a [`TracingNotifier`] (default: true)
    #[serde(default = "default_true")]
    pub log_alerts: bool,

    /// Webhook endpoints receiving every alert as JSON
    #[serde(default)]
    pub webhooks: Vec<WebhookConfig>,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            log_alerts: true,
            webhooks: Vec::new(),
        }
    }
}

/// One webhook destination
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// Destination URL for POST requests
    pub url: String,

    /// Request timeout in seconds (default: 5)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Extra headers, e.g. `Authorization`
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

fn default_true() -> bool {
    true
}

fn default_timeout_secs() -> u64 {
    5
}
