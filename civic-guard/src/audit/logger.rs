//! Security audit log: fire-and-forget writes, paginated reads
//!
//! Writers enqueue onto an unbounded channel and return immediately. A single
//! background worker drains the channel and persists events one at a time,
//! so events enqueued by one request are stored in the order they were
//! logged.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::{mpsc, oneshot};

use super::config::AuditConfig;
use super::event::{SecurityAuditEvent, SecurityEventType};
use super::storage::{AuditQuery, SecurityAuditStorage};
use crate::error::Result;
use crate::geo::LocationResolver;
use crate::pagination::Pagination;
use crate::signals::RequestSignals;

enum Command {
    Record(Box<SecurityAuditEvent>),
    Flush(oneshot::Sender<()>),
    Shutdown(oneshot::Sender<()>),
}

/// Handle to the security audit log
///
/// Cheap to clone; every clone feeds the same worker.
#[derive(Clone)]
pub struct SecurityAuditLog {
    tx: mpsc::UnboundedSender<Command>,
    storage: Arc<dyn SecurityAuditStorage>,
    location: Arc<dyn LocationResolver>,
    config: AuditConfig,
}

impl std::fmt::Debug for SecurityAuditLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecurityAuditLog")
            .field("running", &self.is_running())
            .field("config", &self.config)
            .finish()
    }
}

impl SecurityAuditLog {
    /// Start the background worker and return a handle to it
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(
        storage: Arc<dyn SecurityAuditStorage>,
        location: Arc<dyn LocationResolver>,
        config: AuditConfig,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let worker = AuditWorker {
            storage: Arc::clone(&storage),
            consecutive_failures: 0,
        };
        tokio::spawn(worker.run(rx));

        Self {
            tx,
            storage,
            location,
            config,
        }
    }

    /// Get the audit configuration
    pub fn config(&self) -> &AuditConfig {
        &self.config
    }

    /// Whether the worker still accepts events
    pub fn is_running(&self) -> bool {
        !self.tx.is_closed()
    }

    /// Enqueue a fully built event (fire-and-forget)
    pub fn record(&self, event: SecurityAuditEvent) {
        if !self.config.enabled {
            tracing::trace!(event_type = %event.event_type, "Audit disabled, dropping event");
            return;
        }
        if self.tx.send(Command::Record(Box::new(event))).is_err() {
            tracing::warn!("Audit worker stopped, security event dropped");
        }
    }

    /// Log a security event about `user_id` from `ip`
    pub fn log_security_event(
        &self,
        event_type: SecurityEventType,
        user_id: Option<&str>,
        ip: Option<&str>,
        details: serde_json::Value,
    ) {
        let mut event = SecurityAuditEvent::new(event_type).with_details(details);
        event.user_id = user_id.map(str::to_string);
        event.ip_address = ip.map(str::to_string);
        self.record(event);
    }

    /// Log a security event, taking IP, user agent and location from the
    /// request
    pub fn log_security_event_with_signals(
        &self,
        event_type: SecurityEventType,
        user_id: Option<&str>,
        signals: &RequestSignals,
        details: serde_json::Value,
    ) {
        let ip = signals.client_ip_or_unknown();
        let location = self.location.location_for(&ip);
        let mut event = SecurityAuditEvent::new(event_type)
            .with_ip(ip)
            .with_user_agent(signals.user_agent.clone())
            .with_location(Some(location))
            .with_details(details);
        event.user_id = user_id.map(str::to_string);
        self.record(event);
    }

    /// Wait until every event enqueued before this call has been handled
    pub async fn flush(&self) {
        let (ack, done) = oneshot::channel();
        if self.tx.send(Command::Flush(ack)).is_ok() {
            let _ = done.await;
        }
    }

    /// Persist everything already queued, then stop the worker
    ///
    /// Events logged after shutdown are dropped with a warning.
    pub async fn shutdown(&self) {
        let (ack, done) = oneshot::channel();
        if self.tx.send(Command::Shutdown(ack)).is_ok() {
            let _ = done.await;
        }
    }

    /// Run an arbitrary filter, newest first
    pub async fn query(&self, query: &AuditQuery, page: Pagination) -> Result<Vec<SecurityAuditEvent>> {
        let page = page.capped(self.config.max_page_size as u64);
        self.storage.query(query, page).await
    }

    /// Events about one subject, newest first
    pub async fn events_for_user(&self, user_id: &str, page: Pagination) -> Result<Vec<SecurityAuditEvent>> {
        self.query(&AuditQuery::for_user(user_id), page).await
    }

    /// Events of one type, newest first
    pub async fn events_by_type(
        &self,
        event_type: SecurityEventType,
        page: Pagination,
    ) -> Result<Vec<SecurityAuditEvent>> {
        self.query(&AuditQuery::of_types([event_type]), page).await
    }

    /// Events in `[from, to]`, newest first
    pub async fn events_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        page: Pagination,
    ) -> Result<Vec<SecurityAuditEvent>> {
        self.query(&AuditQuery::default().between(from, to), page).await
    }

    /// Events from one client address, newest first
    pub async fn events_for_ip(&self, ip: &str, page: Pagination) -> Result<Vec<SecurityAuditEvent>> {
        self.query(&AuditQuery::for_ip(ip), page).await
    }

    /// Failed logins, lockouts, suspicious-activity flags and MFA failures
    /// within the configured look-back window (24 hours by default)
    pub async fn recent_suspicious_activity(&self) -> Result<Vec<SecurityAuditEvent>> {
        let since = Utc::now() - Duration::hours(self.config.suspicious_window_hours);
        let query = AuditQuery::of_types(SecurityEventType::SUSPICIOUS).since(since);
        self.query(&query, Pagination::first_page(self.config.max_page_size as u64))
            .await
    }
}

struct AuditWorker {
    storage: Arc<dyn SecurityAuditStorage>,
    consecutive_failures: u64,
}

impl AuditWorker {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Command>) {
        tracing::debug!("Security audit worker started");

        while let Some(command) = rx.recv().await {
            match command {
                Command::Record(event) => self.persist(&event).await,
                Command::Flush(ack) => {
                    let _ = ack.send(());
                }
                Command::Shutdown(ack) => {
                    rx.close();
                    while let Some(pending) = rx.recv().await {
                        match pending {
                            Command::Record(event) => self.persist(&event).await,
                            Command::Flush(ack) | Command::Shutdown(ack) => {
                                let _ = ack.send(());
                            }
                        }
                    }
                    let _ = ack.send(());
                    break;
                }
            }
        }

        tracing::debug!("Security audit worker stopped");
    }

    async fn persist(&mut self, event: &SecurityAuditEvent) {
        match self.storage.append(event).await {
            Ok(()) => {
                if self.consecutive_failures > 0 {
                    tracing::info!(
                        failed_events = self.consecutive_failures,
                        "Security audit storage recovered"
                    );
                    self.consecutive_failures = 0;
                }
            }
            Err(e) => {
                self.consecutive_failures += 1;
                tracing::error!(
                    event_id = %event.id,
                    event_type = %event.event_type,
                    consecutive_failures = self.consecutive_failures,
                    error = %e,
                    "Failed to persist security audit event"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::storage::MemoryAuditStorage;
    use crate::error::Error;
    use crate::geo::StubLocationResolver;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn spawn_log(storage: Arc<MemoryAuditStorage>) -> SecurityAuditLog {
        SecurityAuditLog::spawn(storage, Arc::new(StubLocationResolver), AuditConfig::default())
    }

    #[tokio::test]
    async fn test_events_persist_in_enqueue_order() {
        let storage = Arc::new(MemoryAuditStorage::new());
        let log = spawn_log(Arc::clone(&storage));

        for kind in [
            SecurityEventType::FailedLoginAttempt,
            SecurityEventType::AccountLocked,
            SecurityEventType::SuccessfulLogin,
            SecurityEventType::NewDeviceLogin,
        ] {
            log.log_security_event(kind, Some("a@example.org"), Some("203.0.113.7"), serde_json::json!({}));
        }
        log.flush().await;

        let kinds: Vec<_> = storage.all().await.iter().map(|e| e.event_type).collect();
        assert_eq!(
            kinds,
            vec![
                SecurityEventType::FailedLoginAttempt,
                SecurityEventType::AccountLocked,
                SecurityEventType::SuccessfulLogin,
                SecurityEventType::NewDeviceLogin,
            ]
        );
    }

    #[tokio::test]
    async fn test_with_signals_derives_source_fields() {
        let storage = Arc::new(MemoryAuditStorage::new());
        let log = spawn_log(Arc::clone(&storage));
        let signals = RequestSignals::default()
            .with_user_agent("curl/8.0")
            .with_forwarded_for("203.0.113.7, 10.0.0.1");

        log.log_security_event_with_signals(
            SecurityEventType::PasswordChanged,
            Some("42"),
            &signals,
            serde_json::json!({ "method": "reset" }),
        );
        log.flush().await;

        let events = storage.all().await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].ip_address.as_deref(), Some("203.0.113.7"));
        assert_eq!(events[0].user_agent.as_deref(), Some("curl/8.0"));
        assert_eq!(events[0].location.as_deref(), Some("IP: 203.0.113.7"));
        assert_eq!(events[0].details["method"], "reset");
    }

    #[tokio::test]
    async fn test_disabled_log_drops_events() {
        let storage = Arc::new(MemoryAuditStorage::new());
        let config = AuditConfig {
            enabled: false,
            ..AuditConfig::default()
        };
        let log = SecurityAuditLog::spawn(
            Arc::clone(&storage) as Arc<dyn SecurityAuditStorage>,
            Arc::new(StubLocationResolver),
            config,
        );

        log.log_security_event(SecurityEventType::Logout, Some("42"), None, serde_json::json!({}));
        log.flush().await;
        assert!(storage.is_empty().await);
    }

    struct FailingStorage {
        attempts: AtomicUsize,
    }

    #[async_trait]
    impl SecurityAuditStorage for FailingStorage {
        async fn append(&self, _event: &SecurityAuditEvent) -> Result<()> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Err(Error::Audit("disk full".to_string()))
        }

        async fn query(&self, _query: &AuditQuery, _page: Pagination) -> Result<Vec<SecurityAuditEvent>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_storage_failures_are_swallowed() {
        let storage = Arc::new(FailingStorage {
            attempts: AtomicUsize::new(0),
        });
        let log = SecurityAuditLog::spawn(
            Arc::clone(&storage) as Arc<dyn SecurityAuditStorage>,
            Arc::new(StubLocationResolver),
            AuditConfig::default(),
        );

        log.log_security_event(SecurityEventType::Logout, None, None, serde_json::json!({}));
        log.log_security_event(SecurityEventType::Logout, None, None, serde_json::json!({}));
        log.flush().await;

        assert_eq!(storage.attempts.load(Ordering::SeqCst), 2);
        assert!(log.is_running());
    }

    #[tokio::test]
    async fn test_shutdown_drains_then_stops() {
        let storage = Arc::new(MemoryAuditStorage::new());
        let log = spawn_log(Arc::clone(&storage));

        for _ in 0..10 {
            log.log_security_event(SecurityEventType::Logout, Some("42"), None, serde_json::json!({}));
        }
        log.shutdown().await;
        assert_eq!(storage.len().await, 10);
        assert!(!log.is_running());

        log.log_security_event(SecurityEventType::Logout, Some("42"), None, serde_json::json!({}));
        log.flush().await;
        assert_eq!(storage.len().await, 10);
    }

    #[tokio::test]
    async fn test_recent_suspicious_activity() {
        let storage = Arc::new(MemoryAuditStorage::new());
        let log = spawn_log(Arc::clone(&storage));

        let mut stale = SecurityAuditEvent::new(SecurityEventType::AccountLocked);
        stale.timestamp = Utc::now() - Duration::hours(25);
        storage.append(&stale).await.unwrap();

        log.log_security_event(SecurityEventType::MfaFailure, Some("42"), None, serde_json::json!({}));
        log.log_security_event(SecurityEventType::SuccessfulLogin, Some("42"), None, serde_json::json!({}));
        log.log_security_event(SecurityEventType::FailedLoginAttempt, Some("42"), None, serde_json::json!({}));
        log.flush().await;

        let recent = log.recent_suspicious_activity().await.unwrap();
        let kinds: Vec<_> = recent.iter().map(|e| e.event_type).collect();
        assert_eq!(kinds.len(), 2);
        assert!(kinds.contains(&SecurityEventType::MfaFailure));
        assert!(kinds.contains(&SecurityEventType::FailedLoginAttempt));
    }

    #[tokio::test]
    async fn test_read_helpers() {
        let storage = Arc::new(MemoryAuditStorage::new());
        let log = spawn_log(Arc::clone(&storage));

        log.log_security_event(SecurityEventType::Logout, Some("42"), Some("203.0.113.7"), serde_json::json!({}));
        log.log_security_event(SecurityEventType::Logout, Some("43"), Some("198.51.100.1"), serde_json::json!({}));
        log.log_security_event(SecurityEventType::DeviceTrusted, Some("42"), Some("203.0.113.7"), serde_json::json!({}));
        log.flush().await;

        let page = Pagination::default();
        assert_eq!(log.events_for_user("42", page).await.unwrap().len(), 2);
        assert_eq!(log.events_for_ip("198.51.100.1", page).await.unwrap().len(), 1);
        assert_eq!(
            log.events_by_type(SecurityEventType::Logout, page).await.unwrap().len(),
            2
        );

        let now = Utc::now();
        let all = log
            .events_between(now - Duration::minutes(1), now + Duration::minutes(1), page)
            .await
            .unwrap();
        assert_eq!(all.len(), 3);
    }
}
