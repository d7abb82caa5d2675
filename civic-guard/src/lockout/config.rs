//! Login lockout configuration
//!
//! Configures the failed-attempt window, the lockout threshold and the
//! warning band shown before an account is locked.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Failed attempts that lock an account
pub const MAX_ATTEMPTS: u32 = 5;

/// Minutes an account stays locked
pub const LOCK_DURATION_MINUTES: u64 = 15;

/// First attempt count at which the warning message is shown
pub const WARNING_THRESHOLD: u32 = 3;

/// Login lockout configuration
///
/// # Example (config.toml)
///
/// ```toml
/// [lockout]
/// enabled = true
/// max_attempts = 5
/// window_secs = 900
/// lockout_duration_secs = 900
/// warning_threshold = 3
/// key_prefix = "lockout"
/// memory_purge_interval_secs = 60
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[non_exhaustive]
pub struct LockoutConfig {
    /// Whether lockout enforcement is enabled
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Maximum failed attempts before account is locked
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Sliding window in seconds; refreshed on every failed attempt
    #[serde(default = "default_lockout_duration_secs")]
    pub window_secs: u64,

    /// Duration in seconds that an account remains locked
    #[serde(default = "default_lockout_duration_secs")]
    pub lockout_duration_secs: u64,

    /// Attempt count from which a warning is shown (inclusive); 0 disables
    /// warnings
    #[serde(default = "default_warning_threshold")]
    pub warning_threshold: u32,

    /// Key prefix for the counter and lock keys
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,

    /// Seconds between sweeps of expired keys when the in-memory store is used
    #[serde(default = "default_memory_purge_interval_secs")]
    pub memory_purge_interval_secs: u64,
}

impl LockoutConfig {
    /// Validate the configuration, returning an error message if invalid
    pub fn validate(&self) -> Result<(), String> {
        if self.key_prefix.is_empty() {
            return Err("key_prefix must not be empty".to_string());
        }
        if self.key_prefix.contains(':') {
            return Err("key_prefix must not contain ':'".to_string());
        }
        if self.key_prefix.contains(char::is_whitespace) {
            return Err("key_prefix must not contain whitespace".to_string());
        }
        if self.max_attempts == 0 {
            return Err("max_attempts must be greater than 0".to_string());
        }
        if self.window_secs == 0 {
            return Err("window_secs must be greater than 0".to_string());
        }
        if self.lockout_duration_secs == 0 {
            return Err("lockout_duration_secs must be greater than 0".to_string());
        }
        if self.warnings_enabled() && self.warning_threshold >= self.max_attempts {
            return Err("warning_threshold must be lower than max_attempts".to_string());
        }
        if self.memory_purge_interval_secs == 0 {
            return Err("memory_purge_interval_secs must be greater than 0".to_string());
        }
        Ok(())
    }

    /// Whether a warning band is configured
    pub fn warnings_enabled(&self) -> bool {
        self.warning_threshold > 0
    }

    /// Counter TTL, refreshed on every failure
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    /// Lock TTL
    pub fn lockout_duration(&self) -> Duration {
        Duration::from_secs(self.lockout_duration_secs)
    }

    /// Period of the in-memory store sweep
    pub fn memory_purge_interval(&self) -> Duration {
        Duration::from_secs(self.memory_purge_interval_secs)
    }

    /// Lock duration in whole minutes (rounded up)
    pub fn lockout_duration_minutes(&self) -> u64 {
        self.lockout_duration_secs.div_ceil(60)
    }
}

impl Default for LockoutConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: default_max_attempts(),
            window_secs: default_lockout_duration_secs(),
            lockout_duration_secs: default_lockout_duration_secs(),
            warning_threshold: default_warning_threshold(),
            key_prefix: default_key_prefix(),
            memory_purge_interval_secs: default_memory_purge_interval_secs(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_max_attempts() -> u32 {
    MAX_ATTEMPTS
}

fn default_lockout_duration_secs() -> u64 {
    LOCK_DURATION_MINUTES * 60
}

fn default_warning_threshold() -> u32 {
    WARNING_THRESHOLD
}

fn default_key_prefix() -> String {
    "lockout".to_string()
}

fn default_memory_purge_interval_secs() -> u64 {
    60
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LockoutConfig::default();
        assert!(config.enabled);
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.window_secs, 900);
        assert_eq!(config.lockout_duration_secs, 900);
        assert_eq!(config.lockout_duration_minutes(), 15);
        assert_eq!(config.warning_threshold, 3);
        assert_eq!(config.key_prefix, "lockout");
        assert_eq!(config.memory_purge_interval(), Duration::from_secs(60));
    }

    #[test]
    fn test_validate_valid_config() {
        assert!(LockoutConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validate_key_prefix_with_colon() {
        let mut config = LockoutConfig::default();
        config.key_prefix = "my:prefix".to_string();
        assert_eq!(
            config.validate(),
            Err("key_prefix must not contain ':'".to_string())
        );
    }

    #[test]
    fn test_validate_zero_max_attempts() {
        let mut config = LockoutConfig::default();
        config.max_attempts = 0;
        assert_eq!(
            config.validate(),
            Err("max_attempts must be greater than 0".to_string())
        );
    }

    #[test]
    fn test_validate_warning_band_must_fit() {
        let mut config = LockoutConfig::default();
        config.warning_threshold = 5;
        assert_eq!(
            config.validate(),
            Err("warning_threshold must be lower than max_attempts".to_string())
        );
    }

    #[test]
    fn test_validate_zero_purge_interval() {
        let mut config = LockoutConfig::default();
        config.memory_purge_interval_secs = 0;
        assert_eq!(
            config.validate(),
            Err("memory_purge_interval_secs must be greater than 0".to_string())
        );
    }

    #[test]
    fn test_zero_warning_threshold_disables_band() {
        let mut config = LockoutConfig::default();
        config.warning_threshold = 0;
        assert!(!config.warnings_enabled());
        assert!(config.validate().is_ok());

        config.max_attempts = 1;
        assert!(config.validate().is_ok());
        assert!(LockoutConfig::default().warnings_enabled());
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: LockoutConfig = serde_json::from_str(r#"{"max_attempts": 7}"#).unwrap();
        assert_eq!(config.max_attempts, 7);
        assert_eq!(config.lockout_duration_secs, 900);
        assert_eq!(config.key_prefix, "lockout");
    }

    #[test]
    fn test_minutes_round_up() {
        let mut config = LockoutConfig::default();
        config.lockout_duration_secs = 61;
        assert_eq!(config.lockout_duration_minutes(), 2);
    }
}
