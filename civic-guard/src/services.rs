//! Wiring of the guard, the device engine and their backends
//!
//! [`SecurityServices::builder`] turns a [`Config`] into ready-to-use
//! components. Backends are picked from the config: Redis for the lockout
//! store when `[redis]` is present, PostgreSQL for attempts, devices and
//! audit events when `[database]` is present, in-memory otherwise.
//!
//! ```rust,ignore
//! let services = SecurityServices::builder()
//!     .config(Config::load()?)
//!     .verifier(Arc::new(MyUserStore::new(pool)))
//!     .build()
//!     .await?;
//!
//! let signals = services.signals_from(&headers, Some(remote_addr));
//! let outcome = services.login().authenticate(&email, &password, &signals).await?;
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use http::HeaderMap;

#[cfg(feature = "cache")]
use deadpool_redis::Pool as RedisPool;

#[cfg(feature = "database")]
use sqlx::PgPool;

use crate::audit::{MemoryAuditStorage, SecurityAuditLog, SecurityAuditStorage};
use crate::config::Config;
use crate::device::{DeviceFingerprintEngine, DeviceRepository, MemoryDeviceRepository};
use crate::error::{Error, Result};
use crate::geo::{LocationResolver, StubLocationResolver};
use crate::lockout::{LoginAttemptGuard, LoginAttemptRepository, MemoryAttemptRepository};
use crate::login::{CredentialVerifier, LoginFlow};
use crate::notification::{NotificationDispatcher, SecurityNotifier, TracingNotifier, WebhookNotifier};
use crate::signals::RequestSignals;
use crate::store::{EphemeralStore, MemoryStore};

/// Every component of the subsystem, wired together
#[derive(Clone, Debug)]
pub struct SecurityServices {
    config: Arc<Config>,
    audit: SecurityAuditLog,
    dispatcher: NotificationDispatcher,
    guard: LoginAttemptGuard,
    devices: DeviceFingerprintEngine,
    login: LoginFlow,
}

impl SecurityServices {
    /// Create a new builder
    pub fn builder() -> SecurityServicesBuilder {
        SecurityServicesBuilder::new()
    }

    /// Get the validated configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get the security audit log
    pub fn audit(&self) -> &SecurityAuditLog {
        &self.audit
    }

    /// Get the notification dispatcher
    pub fn dispatcher(&self) -> &NotificationDispatcher {
        &self.dispatcher
    }

    /// Get the login attempt guard
    pub fn guard(&self) -> &LoginAttemptGuard {
        &self.guard
    }

    /// Get the device fingerprint engine
    pub fn devices(&self) -> &DeviceFingerprintEngine {
        &self.devices
    }

    /// Get the login flow
    pub fn login(&self) -> &LoginFlow {
        &self.login
    }

    /// Extract request signals using the configured header names
    pub fn signals_from(&self, headers: &HeaderMap, remote_addr: Option<SocketAddr>) -> RequestSignals {
        RequestSignals::from_headers_with(headers, remote_addr, &self.config.fingerprint.headers)
    }

    /// Write every queued attempt row and audit event, then stop the audit
    /// worker
    pub async fn shutdown(&self) {
        self.guard.flush_attempts().await;
        self.audit.shutdown().await;
        tracing::info!("Security services stopped");
    }
}

/// Builder for [`SecurityServices`]
pub struct SecurityServicesBuilder {
    config: Option<Config>,
    enable_tracing: bool,
    verifier: Option<Arc<dyn CredentialVerifier>>,
    location: Option<Arc<dyn LocationResolver>>,
    store: Option<Arc<dyn EphemeralStore>>,
    notifiers: Vec<Arc<dyn SecurityNotifier>>,

    #[cfg(feature = "cache")]
    redis_pool: Option<RedisPool>,

    #[cfg(feature = "database")]
    db_pool: Option<PgPool>,
}

impl Default for SecurityServicesBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SecurityServicesBuilder {
    /// Create a new builder
    ///
    /// By default the config is `Config::default()` and tracing is
    /// initialized from it.
    pub fn new() -> Self {
        Self {
            config: None,
            enable_tracing: true,
            verifier: None,
            location: None,
            store: None,
            notifiers: Vec::new(),
            #[cfg(feature = "cache")]
            redis_pool: None,
            #[cfg(feature = "database")]
            db_pool: None,
        }
    }

    /// Set the configuration
    pub fn config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the credential check used by the login flow (required)
    pub fn verifier(mut self, verifier: Arc<dyn CredentialVerifier>) -> Self {
        self.verifier = Some(verifier);
        self
    }

    /// Replace the stub location resolver
    pub fn location_resolver(mut self, location: Arc<dyn LocationResolver>) -> Self {
        self.location = Some(location);
        self
    }

    /// Use this store instead of the one selected from the config
    pub fn store(mut self, store: Arc<dyn EphemeralStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Add a notifier next to the configured ones
    pub fn notifier(mut self, notifier: Arc<dyn SecurityNotifier>) -> Self {
        self.notifiers.push(notifier);
        self
    }

    /// Use an existing Redis pool
    #[cfg(feature = "cache")]
    pub fn redis_pool(mut self, pool: RedisPool) -> Self {
        self.redis_pool = Some(pool);
        self
    }

    /// Use an existing database pool
    #[cfg(feature = "database")]
    pub fn db_pool(mut self, pool: PgPool) -> Self {
        self.db_pool = Some(pool);
        self
    }

    /// Disable automatic tracing initialization
    pub fn without_tracing(mut self) -> Self {
        self.enable_tracing = false;
        self
    }

    /// Validate the config, connect backends and wire every component
    ///
    /// Must be called inside a tokio runtime; the audit worker is spawned here.
    pub async fn build(self) -> Result<SecurityServices> {
        let config = self.config.clone().unwrap_or_default();
        config.validate()?;

        if self.enable_tracing {
            crate::observability::init_tracing(&config)?;
        }

        let verifier = self
            .verifier
            .clone()
            .ok_or_else(|| Error::InvalidConfig("a CredentialVerifier is required".to_string()))?;
        let location = self
            .location
            .clone()
            .unwrap_or_else(|| Arc::new(StubLocationResolver) as Arc<dyn LocationResolver>);

        let store = self.build_store(&config).await?;
        let (attempts, devices, audit_storage) = self.build_repositories(&config).await?;

        let audit = SecurityAuditLog::spawn(audit_storage, location.clone(), config.audit.clone());
        let dispatcher = build_dispatcher(&config, self.notifiers);

        let guard = LoginAttemptGuard::new(
            config.lockout.clone(),
            store,
            attempts,
            audit.clone(),
            dispatcher.clone(),
        );
        let devices = DeviceFingerprintEngine::new(devices, audit.clone(), dispatcher.clone(), location.clone());
        let login = LoginFlow::new(guard.clone(), devices.clone(), verifier, location);

        tracing::info!(
            service = %config.service.name,
            max_attempts = config.lockout.max_attempts,
            lockout_minutes = config.lockout.lockout_duration_minutes(),
            notifiers = dispatcher.len(),
            "Security services ready"
        );

        Ok(SecurityServices {
            config: Arc::new(config),
            audit,
            dispatcher,
            guard,
            devices,
            login,
        })
    }

    async fn build_store(&self, config: &Config) -> Result<Arc<dyn EphemeralStore>> {
        if let Some(store) = &self.store {
            return Ok(store.clone());
        }

        #[cfg(feature = "cache")]
        {
            if let Some(pool) = &self.redis_pool {
                return Ok(Arc::new(crate::store::RedisStore::new(pool.clone())));
            }
            if let Some(redis) = &config.redis {
                let pool = crate::cache::create_pool(redis).await?;
                return Ok(Arc::new(crate::store::RedisStore::new(pool)));
            }
        }

        #[cfg(not(feature = "cache"))]
        if config.redis.is_some() {
            tracing::warn!("[redis] is configured but the `cache` feature is disabled");
        }

        tracing::warn!("Using in-memory lockout store; counters are not shared between instances");
        let store = Arc::new(MemoryStore::new());
        store.spawn_purger(config.lockout.memory_purge_interval());
        Ok(store)
    }

    #[allow(clippy::type_complexity)]
    async fn build_repositories(
        &self,
        config: &Config,
    ) -> Result<(
        Arc<dyn LoginAttemptRepository>,
        Arc<dyn DeviceRepository>,
        Arc<dyn SecurityAuditStorage>,
    )> {
        #[cfg(feature = "database")]
        {
            let pool = match (&self.db_pool, &config.database) {
                (Some(pool), _) => Some(pool.clone()),
                (None, Some(db)) => Some(crate::database::create_pool(db).await?),
                (None, None) => None,
            };

            if let Some(pool) = pool {
                let attempts = crate::lockout::PgAttemptRepository::new(pool.clone());
                let devices = crate::device::PgDeviceRepository::new(pool.clone());
                let audit = crate::audit::PgAuditStorage::new(pool);

                if config.database.as_ref().map_or(true, |db| db.run_migrations) {
                    attempts.initialize().await?;
                    devices.initialize().await?;
                    audit.initialize().await?;
                    tracing::info!("Security tables initialized");
                }

                return Ok((Arc::new(attempts), Arc::new(devices), Arc::new(audit)));
            }
        }

        #[cfg(not(feature = "database"))]
        if config.database.is_some() {
            tracing::warn!("[database] is configured but the `database` feature is disabled");
        }

        tracing::warn!("Using in-memory repositories; attempts, devices and audit events are not persisted");
        Ok((
            Arc::new(MemoryAttemptRepository::new()),
            Arc::new(MemoryDeviceRepository::new()),
            Arc::new(MemoryAuditStorage::new()),
        ))
    }
}

fn build_dispatcher(config: &Config, extra: Vec<Arc<dyn SecurityNotifier>>) -> NotificationDispatcher {
    let mut dispatcher = NotificationDispatcher::new();

    if config.notification.log_alerts {
        dispatcher = dispatcher.with_notifier(Arc::new(TracingNotifier));
    }
    for webhook in &config.notification.webhooks {
        dispatcher = dispatcher.with_notifier(Arc::new(WebhookNotifier::from_config(webhook)));
    }
    for notifier in extra {
        dispatcher = dispatcher.with_notifier(notifier);
    }

    dispatcher
}
