//! Device fingerprint engine
//!
//! Recognises the device behind a successful login, stores it, and raises a
//! new-device alert the first time a user signs in from it.

use std::sync::Arc;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::Utc;
use rand::Rng;
use serde_json::json;
use tracing::{debug, info};

use super::fingerprint::DeviceFingerprint;
use super::storage::DeviceRepository;
use crate::audit::{SecurityAuditEvent, SecurityAuditLog, SecurityEventType};
use crate::error::Result;
use crate::geo::LocationResolver;
use crate::notification::{NewDeviceAlert, NotificationDispatcher};
use crate::signals::RequestSignals;

/// Result of processing the device behind a successful login
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceLogin {
    /// The stored row after the upsert
    pub device: DeviceFingerprint,
    /// Whether this user had not signed in from the device before
    pub is_new: bool,
    /// Token sent with the new-device alert; only set when `is_new`
    pub confirmation_token: Option<String>,
}

/// Device fingerprint engine
#[derive(Clone)]
pub struct DeviceFingerprintEngine {
    devices: Arc<dyn DeviceRepository>,
    audit: SecurityAuditLog,
    notifications: NotificationDispatcher,
    location: Arc<dyn LocationResolver>,
}

impl std::fmt::Debug for DeviceFingerprintEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceFingerprintEngine")
            .field("notifications", &self.notifications)
            .finish_non_exhaustive()
    }
}

impl DeviceFingerprintEngine {
    /// Create an engine over the `devices` registry
    pub fn new(
        devices: Arc<dyn DeviceRepository>,
        audit: SecurityAuditLog,
        notifications: NotificationDispatcher,
        location: Arc<dyn LocationResolver>,
    ) -> Self {
        Self {
            devices,
            audit,
            notifications,
            location,
        }
    }

    /// Build an unsaved fingerprint for `user_id`
    pub fn create_fingerprint(&self, signals: &RequestSignals, user_id: &str) -> DeviceFingerprint {
        DeviceFingerprint::from_signals(user_id, signals)
    }

    /// Whether `user_id` owns a stored row with this fingerprint's hash
    pub async fn is_known_device(&self, user_id: &str, fingerprint: &DeviceFingerprint) -> Result<bool> {
        Ok(self
            .devices
            .find(user_id, &fingerprint.fingerprint_hash)
            .await?
            .is_some())
    }

    /// Store the fingerprint or refresh the row already holding its hash
    pub async fn register_device(&self, user_id: &str, fingerprint: &DeviceFingerprint) -> Result<DeviceFingerprint> {
        let mut fingerprint = fingerprint.clone();
        fingerprint.user_id = user_id.to_string();
        fingerprint.last_seen = Utc::now();
        self.devices.upsert(&fingerprint).await
    }

    /// Devices of `user_id`, most recently seen first
    pub async fn get_user_devices(&self, user_id: &str) -> Result<Vec<DeviceFingerprint>> {
        self.devices.list_for_user(user_id).await
    }

    /// Trusted devices of `user_id`, most recently seen first
    pub async fn get_trusted_devices(&self, user_id: &str) -> Result<Vec<DeviceFingerprint>> {
        let mut devices = self.devices.list_for_user(user_id).await?;
        devices.retain(|d| d.trusted);
        Ok(devices)
    }

    /// Mark a device of `user_id` as trusted
    ///
    /// Returns `false`, changing nothing, when the user owns no such device.
    pub async fn trust_device(&self, user_id: &str, fingerprint_hash: &str) -> Result<bool> {
        self.set_trust(user_id, fingerprint_hash, true).await
    }

    /// Revoke trust from a device of `user_id`
    pub async fn untrust_device(&self, user_id: &str, fingerprint_hash: &str) -> Result<bool> {
        self.set_trust(user_id, fingerprint_hash, false).await
    }

    /// Whether the device behind `signals` is new for `user_id`
    pub async fn is_new_device_login(&self, user_id: &str, signals: &RequestSignals) -> Result<bool> {
        let fingerprint = self.create_fingerprint(signals, user_id);
        Ok(!self.is_known_device(user_id, &fingerprint).await?)
    }

    /// Fingerprint, classify and store the device behind a successful login
    ///
    /// Only a new device produces a `NEW_DEVICE_LOGIN` event and a new-device
    /// alert carrying a fresh confirmation token.
    pub async fn process_device_for_login(
        &self,
        user_id: &str,
        email: &str,
        signals: &RequestSignals,
    ) -> Result<DeviceLogin> {
        let fingerprint = self.create_fingerprint(signals, user_id);
        let is_new = !self.is_known_device(user_id, &fingerprint).await?;
        let device = self.register_device(user_id, &fingerprint).await?;

        if !is_new {
            debug!(user_id = %user_id, fingerprint = %fingerprint.fingerprint_hash, "Known device login");
            return Ok(DeviceLogin {
                device,
                is_new,
                confirmation_token: None,
            });
        }

        let location = self.location.location_for(&fingerprint.ip_address);
        info!(
            user_id = %user_id,
            browser = %fingerprint.browser_type,
            os = %fingerprint.operating_system,
            ip = %fingerprint.ip_address,
            "New device login"
        );

        self.audit.record(
            SecurityAuditEvent::new(SecurityEventType::NewDeviceLogin)
                .with_user_id(user_id)
                .with_ip(fingerprint.ip_address.clone())
                .with_user_agent(signals.user_agent.clone())
                .with_location(Some(location.clone()))
                .with_details(json!({
                    "fingerprintHash": fingerprint.fingerprint_hash,
                    "browser": fingerprint.browser_type,
                    "operatingSystem": fingerprint.operating_system,
                    "deviceType": fingerprint.device_type,
                })),
        );

        let token = generate_confirmation_token();
        self.notifications.new_device(NewDeviceAlert {
            user_id: user_id.to_string(),
            email: email.to_string(),
            device_type: fingerprint.device_type.clone(),
            browser: fingerprint.browser_type.clone(),
            operating_system: fingerprint.operating_system.clone(),
            ip_address: fingerprint.ip_address.clone(),
            location,
            login_time: Utc::now(),
            confirmation_token: token.clone(),
        });

        Ok(DeviceLogin {
            device,
            is_new,
            confirmation_token: Some(token),
        })
    }

    async fn set_trust(&self, user_id: &str, fingerprint_hash: &str, trusted: bool) -> Result<bool> {
        let found = self.devices.set_trusted(user_id, fingerprint_hash, trusted).await?;
        if !found {
            debug!(user_id = %user_id, fingerprint = %fingerprint_hash, "Trust change ignored, device not owned by user");
            return Ok(false);
        }

        let event_type = if trusted {
            SecurityEventType::DeviceTrusted
        } else {
            SecurityEventType::DeviceUntrusted
        };
        self.audit.record(
            SecurityAuditEvent::new(event_type)
                .with_user_id(user_id)
                .with_details(json!({ "fingerprintHash": fingerprint_hash })),
        );
        Ok(true)
    }
}

/// 32 random bytes, URL-safe base64 without padding
pub fn generate_confirmation_token() -> String {
    let bytes: [u8; 32] = rand::rng().random();
    URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::Harness;

    const CHROME_WINDOWS: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
    const SAFARI_IPHONE: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Mobile/15E148 Safari/604.1";

    fn chrome() -> RequestSignals {
        RequestSignals::default()
            .with_user_agent(CHROME_WINDOWS)
            .with_accept_language("nl-NL")
            .with_accept_encoding("gzip")
            .with_forwarded_for("203.0.113.7")
    }

    #[test]
    fn test_confirmation_token_shape() {
        let token = generate_confirmation_token();
        // 32 bytes -> 43 base64 chars without padding
        assert_eq!(token.len(), 43);
        assert!(token.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        assert_ne!(token, generate_confirmation_token());
    }

    #[tokio::test]
    async fn test_first_login_is_new_second_is_known() {
        let h = Harness::new();
        let engine = h.engine();

        let first = engine
            .process_device_for_login("42", "resident@example.org", &chrome())
            .await
            .unwrap();
        assert!(first.is_new);
        assert!(first.confirmation_token.is_some());
        assert_eq!(first.device.browser_type, "Chrome");
        assert_eq!(first.device.operating_system, "Windows");
        assert_eq!(first.device.device_type, "Desktop");
        assert!(!first.device.trusted);

        let second = engine
            .process_device_for_login("42", "resident@example.org", &chrome().with_forwarded_for("198.51.100.2"))
            .await
            .unwrap();
        assert!(!second.is_new);
        assert_eq!(second.confirmation_token, None);
        assert_eq!(second.device.id, first.device.id);
        assert_eq!(second.device.ip_address, "198.51.100.2");

        assert_eq!(h.events_of(SecurityEventType::NewDeviceLogin).await.len(), 1);
        let alerts = h.notifier.wait_for_new_device(1).await;
        assert_eq!(alerts[0].browser, "Chrome");
        assert_eq!(alerts[0].location, "IP: 203.0.113.7");
        assert_eq!(Some(alerts[0].confirmation_token.clone()), first.confirmation_token);
    }

    #[tokio::test]
    async fn test_new_device_event_details() {
        let h = Harness::new();
        let engine = h.engine();
        let signals = RequestSignals::default().with_user_agent(SAFARI_IPHONE);

        engine
            .process_device_for_login("42", "resident@example.org", &signals)
            .await
            .unwrap();

        let events = h.events_of(SecurityEventType::NewDeviceLogin).await;
        assert_eq!(events[0].details["browser"], "Safari");
        assert_eq!(events[0].details["operatingSystem"], "iOS");
        assert_eq!(events[0].details["deviceType"], "Mobile");
        assert_eq!(events[0].ip_address.as_deref(), Some("unknown"));
    }

    #[tokio::test]
    async fn test_is_new_device_login() {
        let h = Harness::new();
        let engine = h.engine();

        assert!(engine.is_new_device_login("42", &chrome()).await.unwrap());
        engine
            .process_device_for_login("42", "resident@example.org", &chrome())
            .await
            .unwrap();
        assert!(!engine.is_new_device_login("42", &chrome()).await.unwrap());
    }

    #[tokio::test]
    async fn test_trust_is_idempotent_and_owner_scoped() {
        let h = Harness::new();
        let engine = h.engine();
        let login = engine
            .process_device_for_login("42", "resident@example.org", &chrome())
            .await
            .unwrap();
        let hash = login.device.fingerprint_hash.clone();

        assert!(engine.trust_device("42", &hash).await.unwrap());
        assert!(engine.trust_device("42", &hash).await.unwrap());
        assert_eq!(engine.get_trusted_devices("42").await.unwrap().len(), 1);

        assert!(!engine.untrust_device("43", &hash).await.unwrap());
        assert!(!engine.trust_device("42", "unknown-hash").await.unwrap());
        assert_eq!(engine.get_trusted_devices("42").await.unwrap().len(), 1);

        assert!(engine.untrust_device("42", &hash).await.unwrap());
        assert!(engine.get_trusted_devices("42").await.unwrap().is_empty());
        assert_eq!(engine.get_user_devices("42").await.unwrap().len(), 1);

        assert_eq!(h.events_of(SecurityEventType::DeviceTrusted).await.len(), 2);
        assert_eq!(h.events_of(SecurityEventType::DeviceUntrusted).await.len(), 1);
    }

    #[tokio::test]
    async fn test_shared_signals_map_to_first_owner() {
        let h = Harness::new();
        let engine = h.engine();

        engine
            .process_device_for_login("42", "a@example.org", &chrome())
            .await
            .unwrap();
        let other = engine
            .process_device_for_login("43", "b@example.org", &chrome())
            .await
            .unwrap();

        // same hash, row stays with the first user
        assert!(other.is_new);
        assert_eq!(other.device.user_id, "42");
        assert!(engine.get_user_devices("43").await.unwrap().is_empty());
        assert!(!engine.trust_device("43", &other.device.fingerprint_hash).await.unwrap());
    }
}
