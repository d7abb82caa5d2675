//! Security audit configuration
//!
//! Loaded from the `[audit]` section of config.toml or environment variables.

use serde::{Deserialize, Serialize};

/// Security audit configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Record security events (default: true)
    ///
    /// When false, events are dropped before they reach the worker.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Look-back window for suspicious-activity reports, in hours (default: 24)
    #[serde(default = "default_suspicious_window_hours")]
    pub suspicious_window_hours: i64,

    /// Upper bound for a single page of audit reads (default: 500)
    #[serde(default = "default_max_page_size")]
    pub max_page_size: usize,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            suspicious_window_hours: default_suspicious_window_hours(),
            max_page_size: default_max_page_size(),
        }
    }
}

impl AuditConfig {
    /// Validate the configuration, returning an error message if invalid
    pub fn validate(&self) -> Result<(), String> {
        if self.suspicious_window_hours <= 0 {
            return Err("suspicious_window_hours must be greater than 0".to_string());
        }
        if self.max_page_size == 0 {
            return Err("max_page_size must be greater than 0".to_string());
        }
        Ok(())
    }
}

fn default_true() -> bool {
    true
}

fn default_suspicious_window_hours() -> i64 {
    24
}

fn default_max_page_size() -> usize {
    500
}
