//! Login attempt guard
//!
//! Tracks failed login attempts per identifier in an [`EphemeralStore`] and
//! locks the account once the threshold is reached. The counter expiry is
//! refreshed on every failure, so the window slides.
//!
//! Store failures propagate as [`Error::Store`] and callers must deny the
//! login. Attempt rows, audit events and notifications are best-effort and
//! queued only after the counter and lock have been updated.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use serde_json::json;
use tracing::{debug, info, warn};

use super::attempts::{AttemptRecorder, LoginAttempt, LoginAttemptRepository};
use super::config::LockoutConfig;
use super::normalize_identifier;
use super::state::LockState;
use crate::audit::{SecurityAuditEvent, SecurityAuditLog, SecurityEventType};
use crate::error::Result;
use crate::geo::LocationResolver;
use crate::notification::{AccountLockedAlert, NotificationDispatcher};
use crate::signals::RequestSignals;
use crate::store::EphemeralStore;

/// Client details recorded with an attempt
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttemptContext {
    /// Client user agent
    pub user_agent: Option<String>,
    /// Resolved client location
    pub location: Option<String>,
}

impl AttemptContext {
    /// Context with the given user agent and location
    pub fn new(user_agent: Option<String>, location: Option<String>) -> Self {
        Self {
            user_agent,
            location,
        }
    }

    /// Take the user agent from `signals` and resolve the client location
    pub fn from_signals(signals: &RequestSignals, resolver: &dyn LocationResolver) -> Self {
        let ip = signals.client_ip_or_unknown();
        Self {
            user_agent: signals.user_agent.clone(),
            location: Some(resolver.location_for(&ip)),
        }
    }
}

/// Outcome of recording a failed attempt
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct AttemptStatus {
    /// Failures in the current window, including this one
    pub attempt_count: u32,
    /// Failures that lock the account
    pub max_attempts: u32,
    /// Whether the account is locked after this attempt
    pub locked: bool,
    /// Whether this attempt created the lock
    pub newly_locked: bool,
    /// Warning to show the user, inside the warning band only
    pub warning: Option<String>,
}

impl AttemptStatus {
    /// Failures left before the account locks
    pub fn remaining_attempts(&self) -> u32 {
        self.max_attempts.saturating_sub(self.attempt_count)
    }
}

/// Login attempt guard
///
/// Construct once at startup and share; clones are cheap.
///
/// # Example
///
/// ```rust,ignore
/// if guard.is_locked(&email).await? {
///     let minutes = guard.get_remaining_lock_time_minutes(&email).await?;
///     return Err(Error::AccountLocked { remaining_minutes: minutes });
/// }
/// ```
#[derive(Clone)]
pub struct LoginAttemptGuard {
    config: LockoutConfig,
    store: Arc<dyn EphemeralStore>,
    attempts: AttemptRecorder,
    audit: SecurityAuditLog,
    notifications: NotificationDispatcher,
}

impl std::fmt::Debug for LoginAttemptGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginAttemptGuard")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl LoginAttemptGuard {
    /// Create a new guard
    ///
    /// Starts the attempt-row writer, so it must be called from within a
    /// tokio runtime.
    pub fn new(
        config: LockoutConfig,
        store: Arc<dyn EphemeralStore>,
        attempts: Arc<dyn LoginAttemptRepository>,
        audit: SecurityAuditLog,
        notifications: NotificationDispatcher,
    ) -> Self {
        Self {
            config,
            store,
            attempts: AttemptRecorder::spawn(attempts),
            audit,
            notifications,
        }
    }

    /// Get the lockout configuration
    pub fn config(&self) -> &LockoutConfig {
        &self.config
    }

    /// Wait until every attempt row queued before this call has been written
    pub async fn flush_attempts(&self) {
        self.attempts.flush().await;
    }

    /// Whether the identifier is currently locked
    pub async fn is_locked(&self, identifier: &str) -> Result<bool> {
        Ok(self.lock_state(identifier).await?.is_locked())
    }

    /// Current lock state of the identifier
    pub async fn lock_state(&self, identifier: &str) -> Result<LockState> {
        if !self.config.enabled {
            return Ok(LockState::Unlocked);
        }

        let locked_key = self.locked_key(&normalize_identifier(identifier));
        let Some(locked_at) = self.store.get(&locked_key).await? else {
            return Ok(LockState::Unlocked);
        };

        let until = match parse_locked_at(&locked_at) {
            Some(at) => at + self.lockout_duration(),
            None => {
                // unreadable value, fall back to the key's own expiry
                let ttl = self.store.ttl_remaining(&locked_key).await?.unwrap_or_default();
                Utc::now() + chrono::Duration::from_std(ttl).unwrap_or_else(|_| self.lockout_duration())
            }
        };

        Ok(LockState::Locked { until })
    }

    /// Failed attempts in the current window, 0 when none
    pub async fn get_failed_attempts(&self, identifier: &str) -> Result<u32> {
        if !self.config.enabled {
            return Ok(0);
        }
        let key = self.attempts_key(&normalize_identifier(identifier));
        let count = self.store.get_counter(&key).await?.unwrap_or(0);
        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }

    /// Record a failed login attempt
    ///
    /// Increments the counter and, once it reaches `max_attempts`, locks the
    /// account. Only the call that creates the lock emits `ACCOUNT_LOCKED`
    /// and the account-locked alert.
    pub async fn record_failed_attempt(
        &self,
        identifier: &str,
        ip: &str,
        context: &AttemptContext,
    ) -> Result<AttemptStatus> {
        let identifier = normalize_identifier(identifier);

        if !self.config.enabled {
            self.queue_attempt(&identifier, ip, context, false);
            self.audit(
                SecurityEventType::FailedLoginAttempt,
                &identifier,
                ip,
                context,
                json!({ "attemptCount": 0, "maxAttempts": self.config.max_attempts }),
            );
            return Ok(AttemptStatus {
                attempt_count: 0,
                max_attempts: self.config.max_attempts,
                locked: false,
                newly_locked: false,
                warning: None,
            });
        }

        let attempts_key = self.attempts_key(&identifier);
        let count = self
            .store
            .increment_with_ttl(&attempts_key, self.config.window())
            .await?;
        let count = u32::try_from(count).unwrap_or(u32::MAX);

        debug!(
            identifier = %identifier,
            attempt_count = count,
            max_attempts = self.config.max_attempts,
            "Login failure recorded"
        );

        self.audit(
            SecurityEventType::FailedLoginAttempt,
            &identifier,
            ip,
            context,
            json!({ "attemptCount": count, "maxAttempts": self.config.max_attempts }),
        );

        let mut status = AttemptStatus {
            attempt_count: count,
            max_attempts: self.config.max_attempts,
            locked: false,
            newly_locked: false,
            warning: self.warning_for(count),
        };

        if count >= self.config.max_attempts {
            let locked_at = Utc::now();
            let created = self
                .store
                .set_if_absent_with_ttl(
                    &self.locked_key(&identifier),
                    &locked_at.timestamp().to_string(),
                    self.config.lockout_duration(),
                )
                .await?;

            status.locked = true;
            status.newly_locked = created;

            if created {
                self.on_locked(&identifier, ip, context, locked_at);
            }
        }

        self.queue_attempt(&identifier, ip, context, false);
        Ok(status)
    }

    /// Record a successful login, clearing the counter and any lock
    pub async fn record_successful_attempt(
        &self,
        identifier: &str,
        ip: &str,
        context: &AttemptContext,
    ) -> Result<()> {
        let identifier = normalize_identifier(identifier);

        if self.config.enabled {
            self.clear(&identifier).await?;
        }
        self.queue_attempt(&identifier, ip, context, true);

        self.audit(
            SecurityEventType::SuccessfulLogin,
            &identifier,
            ip,
            context,
            json!({}),
        );
        Ok(())
    }

    /// Whole minutes left on the lock, rounded up; 0 when unlocked
    pub async fn get_remaining_lock_time_minutes(&self, identifier: &str) -> Result<i64> {
        if !self.config.enabled {
            return Ok(0);
        }
        let key = self.locked_key(&normalize_identifier(identifier));
        let minutes = match self.store.ttl_remaining(&key).await? {
            Some(ttl) => ttl.as_millis().div_ceil(60_000),
            None => 0,
        };
        Ok(i64::try_from(minutes).unwrap_or(i64::MAX))
    }

    /// Whether the failure count sits in the warning band
    pub async fn should_show_warning(&self, identifier: &str) -> Result<bool> {
        let count = self.get_failed_attempts(identifier).await?;
        Ok(self.in_warning_band(count))
    }

    /// Warning text for the current failure count, `None` outside the band
    pub async fn get_warning_message(&self, identifier: &str) -> Result<Option<String>> {
        let count = self.get_failed_attempts(identifier).await?;
        Ok(self.warning_for(count))
    }

    /// Administrative unlock
    ///
    /// Clears the counter and the lock and records `ACCOUNT_UNLOCKED`.
    pub async fn unlock(&self, identifier: &str, ip: &str, context: &AttemptContext) -> Result<()> {
        let identifier = normalize_identifier(identifier);
        self.clear(&identifier).await?;

        info!(identifier = %identifier, "Account manually unlocked (admin)");

        self.audit(
            SecurityEventType::AccountUnlocked,
            &identifier,
            ip,
            context,
            json!({ "reason": "admin_action" }),
        );
        Ok(())
    }

    fn on_locked(&self, identifier: &str, ip: &str, context: &AttemptContext, locked_at: DateTime<Utc>) {
        let minutes = self.config.lockout_duration_minutes();
        warn!(
            identifier = %identifier,
            ip = %ip,
            lock_duration_minutes = minutes,
            "Account locked due to repeated login failures"
        );

        self.audit(
            SecurityEventType::AccountLocked,
            identifier,
            ip,
            context,
            json!({
                "lockDurationMinutes": minutes,
                "reason": "Too many failed login attempts",
            }),
        );

        let location = context
            .location
            .clone()
            .unwrap_or_else(|| "unknown".to_string());
        self.notifications.account_locked(AccountLockedAlert {
            email: identifier.to_string(),
            ip_address: ip.to_string(),
            location,
            locked_at,
            lock_duration_minutes: minutes,
        });
    }

    async fn clear(&self, identifier: &str) -> Result<()> {
        let attempts_key = self.attempts_key(identifier);
        let locked_key = self.locked_key(identifier);
        self.store
            .delete(&[attempts_key.as_str(), locked_key.as_str()])
            .await
    }

    fn queue_attempt(&self, identifier: &str, ip: &str, context: &AttemptContext, successful: bool) {
        let mut attempt = LoginAttempt::new(identifier, ip, successful);
        attempt.user_agent = context.user_agent.clone();
        attempt.location = context.location.clone();
        self.attempts.record(attempt);
    }

    fn audit(
        &self,
        event_type: SecurityEventType,
        identifier: &str,
        ip: &str,
        context: &AttemptContext,
        details: serde_json::Value,
    ) {
        let event = SecurityAuditEvent::new(event_type)
            .with_user_id(identifier)
            .with_ip(ip)
            .with_user_agent(context.user_agent.clone())
            .with_location(context.location.clone())
            .with_details(details);
        self.audit.record(event);
    }

    fn in_warning_band(&self, count: u32) -> bool {
        self.config.warnings_enabled()
            && count >= self.config.warning_threshold
            && count < self.config.max_attempts
    }

    fn warning_for(&self, count: u32) -> Option<String> {
        self.in_warning_band(count)
            .then(|| warning_message(count, self.config.max_attempts - count))
    }

    fn lockout_duration(&self) -> chrono::Duration {
        chrono::Duration::seconds(i64::try_from(self.config.lockout_duration_secs).unwrap_or(i64::MAX))
    }

    /// Build the store key for the attempt counter
    fn attempts_key(&self, identifier: &str) -> String {
        format!("{}:attempts:{}", self.config.key_prefix, identifier)
    }

    /// Build the store key for the lock flag
    fn locked_key(&self, identifier: &str) -> String {
        format!("{}:locked:{}", self.config.key_prefix, identifier)
    }
}

/// User-facing warning shown inside the warning band
pub fn warning_message(count: u32, remaining: u32) -> String {
    format!(
        "Warning: {} failed login attempt(s). Your account will be locked after {} more failed attempt(s).",
        count, remaining
    )
}

fn parse_locked_at(value: &str) -> Option<DateTime<Utc>> {
    let secs = value.parse::<i64>().ok()?;
    Utc.timestamp_opt(secs, 0).single()
}
