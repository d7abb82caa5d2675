//! Login flow
//!
//! Runs one authentication attempt through the guard, the external
//! credential check and the device engine, in that order:
//!
//! 1. normalize the identifier
//! 2. refuse immediately while the account is locked
//! 3. verify credentials
//! 4. on failure, count it (possibly locking the account)
//! 5. on success, reset the counter and process the device

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::device::{DeviceFingerprint, DeviceFingerprintEngine};
use crate::error::{Error, Result};
use crate::geo::LocationResolver;
use crate::lockout::{normalize_identifier, AttemptContext, LoginAttemptGuard};
use crate::signals::RequestSignals;

/// Account returned by a successful credential check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifiedUser {
    pub id: String,
    pub email: String,
}

/// External credential check
///
/// Password hashing is the implementor's concern. Return `Ok(None)` for wrong
/// credentials and reserve `Err` for infrastructure failures.
#[async_trait]
pub trait CredentialVerifier: Send + Sync + 'static {
    async fn verify(&self, identifier: &str, secret: &str) -> Result<Option<VerifiedUser>>;
}

/// A successful login
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginOutcome {
    pub user: VerifiedUser,
    /// The stored device row; `None` if device bookkeeping failed
    pub device: Option<DeviceFingerprint>,
    /// Whether the login came from a device new to this user
    pub new_device: bool,
}

/// Orchestrates a single authentication attempt
#[derive(Clone)]
pub struct LoginFlow {
    guard: LoginAttemptGuard,
    devices: DeviceFingerprintEngine,
    verifier: Arc<dyn CredentialVerifier>,
    location: Arc<dyn LocationResolver>,
}

impl std::fmt::Debug for LoginFlow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginFlow")
            .field("guard", &self.guard)
            .field("devices", &self.devices)
            .finish_non_exhaustive()
    }
}

impl LoginFlow {
    /// Wire the flow from its collaborators
    pub fn new(
        guard: LoginAttemptGuard,
        devices: DeviceFingerprintEngine,
        verifier: Arc<dyn CredentialVerifier>,
        location: Arc<dyn LocationResolver>,
    ) -> Self {
        Self {
            guard,
            devices,
            verifier,
            location,
        }
    }

    /// Get the login attempt guard
    pub fn guard(&self) -> &LoginAttemptGuard {
        &self.guard
    }

    /// Get the device fingerprint engine
    pub fn devices(&self) -> &DeviceFingerprintEngine {
        &self.devices
    }

    /// Authenticate `identifier` with `secret`
    ///
    /// # Errors
    ///
    /// - [`Error::AccountLocked`] while locked, including when this attempt
    ///   caused the lock; credentials are not checked while locked
    /// - [`Error::InvalidCredentials`] with the warning text inside the
    ///   warning band
    /// - [`Error::Store`] when lockout state cannot be read
    pub async fn authenticate(
        &self,
        identifier: &str,
        secret: &str,
        signals: &RequestSignals,
    ) -> Result<LoginOutcome> {
        let identifier = normalize_identifier(identifier);
        let ip = signals.client_ip_or_unknown();

        if self.guard.is_locked(&identifier).await? {
            let remaining_minutes = self.guard.get_remaining_lock_time_minutes(&identifier).await?;
            debug!(identifier = %identifier, remaining_minutes, "Login refused, account locked");
            return Err(Error::AccountLocked { remaining_minutes });
        }

        let context = AttemptContext::from_signals(signals, self.location.as_ref());

        let Some(user) = self.verifier.verify(&identifier, secret).await? else {
            let status = self
                .guard
                .record_failed_attempt(&identifier, &ip, &context)
                .await?;

            if status.locked {
                let remaining_minutes = self.guard.get_remaining_lock_time_minutes(&identifier).await?;
                return Err(Error::AccountLocked { remaining_minutes });
            }
            return Err(Error::InvalidCredentials {
                warning: status.warning,
            });
        };

        self.guard
            .record_successful_attempt(&identifier, &ip, &context)
            .await?;

        let (device, new_device) = match self
            .devices
            .process_device_for_login(&user.id, &user.email, signals)
            .await
        {
            Ok(login) => (Some(login.device), login.is_new),
            Err(e) => {
                warn!(user_id = %user.id, error = %e, "Device processing failed, continuing login");
                (None, false)
            }
        };

        Ok(LoginOutcome {
            user,
            device,
            new_device,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::SecurityEventType;
    use crate::geo::StubLocationResolver;
    use crate::lockout::LockoutConfig;
    use crate::test_support::Harness;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StaticVerifier {
        calls: AtomicUsize,
    }

    impl StaticVerifier {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl CredentialVerifier for StaticVerifier {
        async fn verify(&self, identifier: &str, secret: &str) -> Result<Option<VerifiedUser>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok((identifier == "resident@example.org" && secret == "correct horse").then(|| VerifiedUser {
                id: "42".to_string(),
                email: "resident@example.org".to_string(),
            }))
        }
    }

    fn flow(h: &Harness, verifier: Arc<StaticVerifier>) -> LoginFlow {
        LoginFlow::new(
            h.guard(LockoutConfig::default()),
            h.engine(),
            verifier,
            Arc::new(StubLocationResolver),
        )
    }

    fn signals() -> RequestSignals {
        RequestSignals::default()
            .with_user_agent("Mozilla/5.0 (X11; Linux x86_64; rv:121.0) Gecko/20100101 Firefox/121.0")
            .with_forwarded_for("203.0.113.7")
    }

    #[tokio::test]
    async fn test_successful_login_from_new_device() {
        let h = Harness::new();
        let flow = flow(&h, StaticVerifier::new());

        let outcome = flow
            .authenticate(" Resident@Example.org", "correct horse", &signals())
            .await
            .unwrap();
        assert_eq!(outcome.user.id, "42");
        assert!(outcome.new_device);
        assert_eq!(outcome.device.unwrap().user_id, "42");

        let again = flow
            .authenticate("resident@example.org", "correct horse", &signals())
            .await
            .unwrap();
        assert!(!again.new_device);

        let kinds: Vec<_> = h.events().await.iter().map(|e| e.event_type).collect();
        assert_eq!(
            kinds,
            vec![
                SecurityEventType::SuccessfulLogin,
                SecurityEventType::NewDeviceLogin,
                SecurityEventType::SuccessfulLogin,
            ]
        );
        assert_eq!(h.notifier.wait_for_new_device(1).await.len(), 1);
    }

    #[tokio::test]
    async fn test_warning_then_lock_then_refuse() {
        let h = Harness::new();
        let verifier = StaticVerifier::new();
        let flow = flow(&h, verifier.clone());

        for attempt in 1..=4 {
            let err = flow
                .authenticate("resident@example.org", "wrong", &signals())
                .await
                .unwrap_err();
            match err {
                Error::InvalidCredentials { warning } => assert_eq!(warning.is_some(), attempt >= 3),
                other => panic!("unexpected error: {other:?}"),
            }
        }

        let err = flow
            .authenticate("resident@example.org", "wrong", &signals())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AccountLocked { remaining_minutes: 15 }));
        assert_eq!(verifier.calls.load(Ordering::SeqCst), 5);

        // locked: the right password is not even checked
        let err = flow
            .authenticate("resident@example.org", "correct horse", &signals())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AccountLocked { .. }));
        assert_eq!(verifier.calls.load(Ordering::SeqCst), 5);
        assert_eq!(
            err.user_message(),
            "Account is temporarily locked due to too many failed login attempts. Please try again in 15 minute(s)."
        );

        let alerts = h.notifier.wait_for_locked(1).await;
        assert_eq!(alerts[0].email, "resident@example.org");
        assert_eq!(alerts[0].ip_address, "203.0.113.7");
    }

    #[tokio::test]
    async fn test_success_clears_failures() {
        let h = Harness::new();
        let flow = flow(&h, StaticVerifier::new());

        for _ in 0..3 {
            let _ = flow.authenticate("resident@example.org", "wrong", &signals()).await;
        }
        flow.authenticate("resident@example.org", "correct horse", &signals())
            .await
            .unwrap();
        assert_eq!(
            flow.guard().get_failed_attempts("resident@example.org").await.unwrap(),
            0
        );

        let err = flow
            .authenticate("resident@example.org", "wrong", &signals())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidCredentials { warning: None }));
    }

    #[tokio::test]
    async fn test_store_outage_fails_closed() {
        let h = Harness::new();
        let verifier = StaticVerifier::new();
        let flow = LoginFlow::new(
            h.guard_with_store(LockoutConfig::default(), Arc::new(crate::test_support::DownStore)),
            h.engine(),
            verifier.clone(),
            Arc::new(StubLocationResolver),
        );

        let err = flow
            .authenticate("resident@example.org", "correct horse", &signals())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Store(_)));
        assert_eq!(verifier.calls.load(Ordering::SeqCst), 0);
    }
}
