//! Fire-and-forget alert fan-out

use std::sync::Arc;

use futures::future::join_all;
use tokio::task::JoinHandle;

use super::{AccountLockedAlert, NewDeviceAlert, SecurityNotifier};

/// Fans alerts out to every registered notifier
///
/// Each dispatch spawns one task that drives all notifiers concurrently. The
/// returned handle may be dropped; tests await it to observe delivery.
#[derive(Clone, Default)]
pub struct NotificationDispatcher {
    notifiers: Vec<Arc<dyn SecurityNotifier>>,
}

impl std::fmt::Debug for NotificationDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationDispatcher")
            .field(
                "notifiers",
                &self.notifiers.iter().map(|n| n.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl NotificationDispatcher {
    /// Dispatcher with no notifiers; every alert is discarded
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a notifier
    pub fn with_notifier(mut self, notifier: Arc<dyn SecurityNotifier>) -> Self {
        self.notifiers.push(notifier);
        self
    }

    /// Number of registered notifiers
    pub fn len(&self) -> usize {
        self.notifiers.len()
    }

    /// Whether no notifier is registered
    pub fn is_empty(&self) -> bool {
        self.notifiers.is_empty()
    }

    /// Deliver an account-locked alert in the background
    pub fn account_locked(&self, alert: AccountLockedAlert) -> JoinHandle<()> {
        let notifiers = self.notifiers.clone();
        tokio::spawn(async move {
            let deliveries = notifiers.iter().map(|notifier| {
                let alert = &alert;
                async move {
                    if let Err(e) = notifier.send_account_locked_alert(alert).await {
                        tracing::warn!(
                            notifier = notifier.name(),
                            email = %alert.email,
                            error = %e,
                            "Failed to deliver account-locked alert"
                        );
                    }
                }
            });
            join_all(deliveries).await;
        })
    }

    /// Deliver a new-device alert in the background
    pub fn new_device(&self, alert: NewDeviceAlert) -> JoinHandle<()> {
        let notifiers = self.notifiers.clone();
        tokio::spawn(async move {
            let deliveries = notifiers.iter().map(|notifier| {
                let alert = &alert;
                async move {
                    if let Err(e) = notifier.send_new_device_alert(alert).await {
                        tracing::warn!(
                            notifier = notifier.name(),
                            user_id = %alert.user_id,
                            error = %e,
                            "Failed to deliver new-device alert"
                        );
                    }
                }
            });
            join_all(deliveries).await;
        })
    }
}
