//! Shared fixtures for unit tests

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::audit::{AuditConfig, MemoryAuditStorage, SecurityAuditEvent, SecurityAuditLog, SecurityEventType};
use crate::device::{DeviceFingerprintEngine, MemoryDeviceRepository};
use crate::error::{Error, Result};
use crate::geo::StubLocationResolver;
use crate::lockout::{LockoutConfig, LoginAttemptGuard, MemoryAttemptRepository};
use crate::notification::{AccountLockedAlert, NewDeviceAlert, NotificationDispatcher, SecurityNotifier};
use crate::store::{EphemeralStore, MemoryStore};

/// Notifier that keeps every alert it receives
#[derive(Default)]
pub(crate) struct RecordingNotifier {
    locked: Mutex<Vec<AccountLockedAlert>>,
    new_device: Mutex<Vec<NewDeviceAlert>>,
}

impl RecordingNotifier {
    pub(crate) fn locked_alerts(&self) -> Vec<AccountLockedAlert> {
        self.locked.lock().unwrap().clone()
    }

    pub(crate) fn new_device_alerts(&self) -> Vec<NewDeviceAlert> {
        self.new_device.lock().unwrap().clone()
    }

    /// Wait (up to two seconds) until at least `n` account-locked alerts arrived
    pub(crate) async fn wait_for_locked(&self, n: usize) -> Vec<AccountLockedAlert> {
        for _ in 0..400 {
            let alerts = self.locked_alerts();
            if alerts.len() >= n {
                return alerts;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("expected {} account-locked alert(s)", n);
    }

    /// Wait (up to two seconds) until at least `n` new-device alerts arrived
    pub(crate) async fn wait_for_new_device(&self, n: usize) -> Vec<NewDeviceAlert> {
        for _ in 0..400 {
            let alerts = self.new_device_alerts();
            if alerts.len() >= n {
                return alerts;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("expected {} new-device alert(s)", n);
    }
}

#[async_trait]
impl SecurityNotifier for RecordingNotifier {
    async fn send_account_locked_alert(&self, alert: &AccountLockedAlert) -> Result<()> {
        self.locked.lock().unwrap().push(alert.clone());
        Ok(())
    }

    async fn send_new_device_alert(&self, alert: &NewDeviceAlert) -> Result<()> {
        self.new_device.lock().unwrap().push(alert.clone());
        Ok(())
    }
}

/// Store whose every call fails like an unreachable Redis
pub(crate) struct DownStore;

#[async_trait]
impl EphemeralStore for DownStore {
    async fn increment_with_ttl(&self, _key: &str, _ttl: Duration) -> Result<u64> {
        Err(Error::Store("connection refused".to_string()))
    }

    async fn set_if_absent_with_ttl(&self, _key: &str, _value: &str, _ttl: Duration) -> Result<bool> {
        Err(Error::Store("connection refused".to_string()))
    }

    async fn get_counter(&self, _key: &str) -> Result<Option<u64>> {
        Err(Error::Store("connection refused".to_string()))
    }

    async fn get(&self, _key: &str) -> Result<Option<String>> {
        Err(Error::Store("connection refused".to_string()))
    }

    async fn ttl_remaining(&self, _key: &str) -> Result<Option<Duration>> {
        Err(Error::Store("connection refused".to_string()))
    }

    async fn delete(&self, _keys: &[&str]) -> Result<()> {
        Err(Error::Store("connection refused".to_string()))
    }
}

/// In-memory collaborators wired the way production wires the real ones
pub(crate) struct Harness {
    pub(crate) store: Arc<MemoryStore>,
    pub(crate) attempts: Arc<MemoryAttemptRepository>,
    pub(crate) devices: Arc<MemoryDeviceRepository>,
    pub(crate) audit_storage: Arc<MemoryAuditStorage>,
    pub(crate) audit: SecurityAuditLog,
    pub(crate) notifier: Arc<RecordingNotifier>,
    pub(crate) dispatcher: NotificationDispatcher,
}

impl Harness {
    /// Must be called inside a tokio runtime
    pub(crate) fn new() -> Self {
        let audit_storage = Arc::new(MemoryAuditStorage::new());
        let audit = SecurityAuditLog::spawn(
            audit_storage.clone(),
            Arc::new(StubLocationResolver),
            AuditConfig::default(),
        );
        let notifier = Arc::new(RecordingNotifier::default());
        let dispatcher = NotificationDispatcher::new().with_notifier(notifier.clone());

        Self {
            store: Arc::new(MemoryStore::new()),
            attempts: Arc::new(MemoryAttemptRepository::new()),
            devices: Arc::new(MemoryDeviceRepository::new()),
            audit_storage,
            audit,
            notifier,
            dispatcher,
        }
    }

    pub(crate) fn guard(&self, config: LockoutConfig) -> LoginAttemptGuard {
        self.guard_with_store(config, self.store.clone())
    }

    pub(crate) fn guard_with_store(&self, config: LockoutConfig, store: Arc<dyn EphemeralStore>) -> LoginAttemptGuard {
        LoginAttemptGuard::new(
            config,
            store,
            self.attempts.clone(),
            self.audit.clone(),
            self.dispatcher.clone(),
        )
    }

    pub(crate) fn engine(&self) -> DeviceFingerprintEngine {
        DeviceFingerprintEngine::new(
            self.devices.clone(),
            self.audit.clone(),
            self.dispatcher.clone(),
            Arc::new(StubLocationResolver),
        )
    }

    /// Every persisted audit event, after draining the queue
    pub(crate) async fn events(&self) -> Vec<SecurityAuditEvent> {
        self.audit.flush().await;
        self.audit_storage.all().await
    }

    /// Persisted audit events of one type, in enqueue order
    pub(crate) async fn events_of(&self, event_type: SecurityEventType) -> Vec<SecurityAuditEvent> {
        self.events()
            .await
            .into_iter()
            .filter(|e| e.event_type == event_type)
            .collect()
    }
}
