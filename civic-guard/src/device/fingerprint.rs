//! Device fingerprint record and hash

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use super::user_agent::ParsedUserAgent;
use crate::signals::RequestSignals;

/// A device seen signing in to an account
///
/// `fingerprint_hash` is unique across all users: it is derived from client
/// signals only, so two users on identical browsers share one row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceFingerprint {
    pub id: Uuid,
    /// Owner of the row
    pub user_id: String,
    /// SHA-256 hex over the client signals
    pub fingerprint_hash: String,
    pub browser_type: String,
    pub operating_system: String,
    pub device_type: String,
    /// Address of the most recent sign-in
    pub ip_address: String,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    /// Set only through explicit trust/untrust calls
    pub trusted: bool,
}

impl DeviceFingerprint {
    /// Build an unsaved fingerprint for `user_id` from request signals
    ///
    /// `first_seen` and `last_seen` are both set to now; `trusted` is false.
    pub fn from_signals(user_id: impl Into<String>, signals: &RequestSignals) -> Self {
        let parsed = ParsedUserAgent::parse(signals.user_agent.as_deref());
        let hash = fingerprint_hash(signals, &parsed);
        let now = Utc::now();

        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            fingerprint_hash: hash,
            browser_type: parsed.browser.to_string(),
            operating_system: parsed.operating_system.to_string(),
            device_type: parsed.device_type.to_string(),
            ip_address: signals.client_ip_or_unknown(),
            first_seen: now,
            last_seen: now,
            trusted: false,
        }
    }
}

/// SHA-256 hex of `user_agent|accept_language|accept_encoding|browser|os`
///
/// Missing headers contribute an empty string. The client IP is not part of
/// the input, so a device keeps its hash across networks.
pub fn fingerprint_hash(signals: &RequestSignals, parsed: &ParsedUserAgent) -> String {
    let input = [
        signals.user_agent.as_deref().unwrap_or_default(),
        signals.accept_language.as_deref().unwrap_or_default(),
        signals.accept_encoding.as_deref().unwrap_or_default(),
        parsed.browser.as_str(),
        parsed.operating_system.as_str(),
    ]
    .join("|");

    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIREFOX: &str = "Mozilla/5.0 (X11; Linux x86_64; rv:121.0) Gecko/20100101 Firefox/121.0";

    fn signals() -> RequestSignals {
        RequestSignals::default()
            .with_user_agent(FIREFOX)
            .with_accept_language("nl-NL,nl;q=0.9")
            .with_accept_encoding("gzip, deflate, br")
    }

    #[test]
    fn test_hash_known_input() {
        let parsed = ParsedUserAgent::parse(None);
        let mut hasher = Sha256::new();
        hasher.update(b"|||Unknown|Unknown");
        let expected = hex::encode(hasher.finalize());
        assert_eq!(fingerprint_hash(&RequestSignals::default(), &parsed), expected);
        assert_eq!(expected.len(), 64);
    }

    #[test]
    fn test_ip_is_not_part_of_the_hash() {
        let home = DeviceFingerprint::from_signals("42", &signals().with_forwarded_for("203.0.113.7"));
        let office = DeviceFingerprint::from_signals("42", &signals().with_real_ip("198.51.100.2"));

        assert_eq!(home.fingerprint_hash, office.fingerprint_hash);
        assert_eq!(home.ip_address, "203.0.113.7");
        assert_eq!(office.ip_address, "198.51.100.2");
    }

    #[test]
    fn test_hash_is_not_salted_with_user() {
        let a = DeviceFingerprint::from_signals("42", &signals());
        let b = DeviceFingerprint::from_signals("43", &signals());
        assert_eq!(a.fingerprint_hash, b.fingerprint_hash);
    }

    #[test]
    fn test_any_header_change_changes_hash() {
        let base = DeviceFingerprint::from_signals("42", &signals());
        let other = DeviceFingerprint::from_signals("42", &signals().with_accept_language("en-US"));
        assert_ne!(base.fingerprint_hash, other.fingerprint_hash);
    }

    #[test]
    fn test_new_fingerprint_defaults() {
        let fp = DeviceFingerprint::from_signals("42", &signals());
        assert_eq!(fp.first_seen, fp.last_seen);
        assert!(!fp.trusted);
        assert_eq!(fp.browser_type, "Firefox");
        assert_eq!(fp.operating_system, "Linux");
        assert_eq!(fp.device_type, "Desktop");
        assert_eq!(fp.ip_address, "unknown");
    }
}
