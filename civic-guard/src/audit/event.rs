//! Security audit event types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single security audit record
///
/// `user_id` holds whatever identified the subject at the time of the event;
/// before a login resolves to an account that is the submitted email.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityAuditEvent {
    /// Unique event identifier
    pub id: Uuid,
    /// Subject of the event (user id or login identifier)
    pub user_id: Option<String>,
    /// Category of the event
    pub event_type: SecurityEventType,
    /// Client IP address
    pub ip_address: Option<String>,
    /// When the event occurred
    pub timestamp: DateTime<Utc>,
    /// Structured event details (always a JSON object)
    pub details: serde_json::Value,
    /// User agent string
    pub user_agent: Option<String>,
    /// Resolved client location
    pub location: Option<String>,
}

impl SecurityAuditEvent {
    /// Create an event of the given type stamped with the current time
    pub fn new(event_type: SecurityEventType) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: None,
            event_type,
            ip_address: None,
            timestamp: Utc::now(),
            details: serde_json::Value::Object(serde_json::Map::new()),
            user_agent: None,
            location: None,
        }
    }

    /// Set the subject
    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Set the client IP
    pub fn with_ip(mut self, ip: impl Into<String>) -> Self {
        self.ip_address = Some(ip.into());
        self
    }

    /// Set the user agent
    pub fn with_user_agent(mut self, user_agent: Option<String>) -> Self {
        self.user_agent = user_agent;
        self
    }

    /// Set the location
    pub fn with_location(mut self, location: Option<String>) -> Self {
        self.location = location;
        self
    }

    /// Set the details payload
    ///
    /// Non-object values are wrapped as `{"value": ...}` so `details` stays a
    /// JSON object.
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = match details {
            serde_json::Value::Object(_) => details,
            serde_json::Value::Null => serde_json::Value::Object(serde_json::Map::new()),
            other => serde_json::json!({ "value": other }),
        };
        self
    }
}

/// Categories of security events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SecurityEventType {
    /// Wrong credentials submitted
    FailedLoginAttempt,
    /// Account locked after too many failures
    AccountLocked,
    /// Account unlocked by an administrator
    AccountUnlocked,
    /// Credentials accepted
    SuccessfulLogin,
    /// Login from a device not seen before for this user
    NewDeviceLogin,
    /// User marked a device as trusted
    DeviceTrusted,
    /// User revoked trust from a device
    DeviceUntrusted,
    /// Activity flagged as suspicious
    SuspiciousActivity,
    /// Second factor rejected
    MfaFailure,
    /// Password changed
    PasswordChanged,
    /// User logged out
    Logout,
}

impl SecurityEventType {
    /// Every event type, in declaration order
    pub const ALL: [SecurityEventType; 11] = [
        Self::FailedLoginAttempt,
        Self::AccountLocked,
        Self::AccountUnlocked,
        Self::SuccessfulLogin,
        Self::NewDeviceLogin,
        Self::DeviceTrusted,
        Self::DeviceUntrusted,
        Self::SuspiciousActivity,
        Self::MfaFailure,
        Self::PasswordChanged,
        Self::Logout,
    ];

    /// Event types surfaced by suspicious-activity reports
    pub const SUSPICIOUS: [SecurityEventType; 4] = [
        Self::FailedLoginAttempt,
        Self::AccountLocked,
        Self::SuspiciousActivity,
        Self::MfaFailure,
    ];

    /// Stored name, e.g. `FAILED_LOGIN_ATTEMPT`
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FailedLoginAttempt => "FAILED_LOGIN_ATTEMPT",
            Self::AccountLocked => "ACCOUNT_LOCKED",
            Self::AccountUnlocked => "ACCOUNT_UNLOCKED",
            Self::SuccessfulLogin => "SUCCESSFUL_LOGIN",
            Self::NewDeviceLogin => "NEW_DEVICE_LOGIN",
            Self::DeviceTrusted => "DEVICE_TRUSTED",
            Self::DeviceUntrusted => "DEVICE_UNTRUSTED",
            Self::SuspiciousActivity => "SUSPICIOUS_ACTIVITY",
            Self::MfaFailure => "MFA_FAILURE",
            Self::PasswordChanged => "PASSWORD_CHANGED",
            Self::Logout => "LOGOUT",
        }
    }

    /// Whether this type counts towards suspicious-activity reports
    pub fn is_suspicious(&self) -> bool {
        Self::SUSPICIOUS.contains(self)
    }
}

impl std::fmt::Display for SecurityEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SecurityEventType {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| crate::error::Error::Audit(format!("Unknown security event type '{}'", s)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_new_has_empty_details() {
        let event = SecurityAuditEvent::new(SecurityEventType::SuccessfulLogin);
        assert_eq!(event.event_type, SecurityEventType::SuccessfulLogin);
        assert_eq!(event.details, serde_json::json!({}));
        assert!(event.user_id.is_none());
    }

    #[test]
    fn test_details_always_an_object() {
        let event = SecurityAuditEvent::new(SecurityEventType::Logout)
            .with_details(serde_json::json!("bye"));
        assert_eq!(event.details, serde_json::json!({ "value": "bye" }));

        let event = SecurityAuditEvent::new(SecurityEventType::Logout)
            .with_details(serde_json::Value::Null);
        assert_eq!(event.details, serde_json::json!({}));
    }

    #[test]
    fn test_event_type_serializes_screaming_snake_case() {
        let json = serde_json::to_string(&SecurityEventType::FailedLoginAttempt).unwrap();
        assert_eq!(json, "\"FAILED_LOGIN_ATTEMPT\"");

        for kind in SecurityEventType::ALL {
            let json = serde_json::to_value(kind).unwrap();
            assert_eq!(json.as_str(), Some(kind.as_str()));
        }
    }

    #[test]
    fn test_event_type_from_str() {
        assert_eq!(
            "NEW_DEVICE_LOGIN".parse::<SecurityEventType>().unwrap(),
            SecurityEventType::NewDeviceLogin
        );
        assert!("new_device_login".parse::<SecurityEventType>().is_err());
    }

    #[test]
    fn test_suspicious_types() {
        assert!(SecurityEventType::MfaFailure.is_suspicious());
        assert!(SecurityEventType::AccountLocked.is_suspicious());
        assert!(!SecurityEventType::SuccessfulLogin.is_suspicious());
        assert!(!SecurityEventType::AccountUnlocked.is_suspicious());
    }

    #[test]
    fn test_event_serde_roundtrip() {
        let event = SecurityAuditEvent::new(SecurityEventType::AccountLocked)
            .with_user_id("resident@example.org")
            .with_ip("203.0.113.7")
            .with_details(serde_json::json!({ "lockDurationMinutes": 15 }));

        let json = serde_json::to_string(&event).unwrap();
        let back: SecurityAuditEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }
}
