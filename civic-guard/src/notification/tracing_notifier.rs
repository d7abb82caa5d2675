//! Notifier that writes alerts to the structured log

use async_trait::async_trait;

use super::{AccountLockedAlert, NewDeviceAlert, SecurityNotifier};
use crate::error::Result;

/// Logs every alert at `WARN` (lockouts) or `INFO` (new devices)
///
/// Useful on its own in development and as an audit trail next to real
/// delivery channels.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

#[async_trait]
impl SecurityNotifier for TracingNotifier {
    async fn send_account_locked_alert(&self, alert: &AccountLockedAlert) -> Result<()> {
        tracing::warn!(
            email = %alert.email,
            ip = %alert.ip_address,
            location = %alert.location,
            locked_at = %alert.locked_at,
            lock_duration_minutes = alert.lock_duration_minutes,
            "Account locked alert"
        );
        Ok(())
    }

    async fn send_new_device_alert(&self, alert: &NewDeviceAlert) -> Result<()> {
        tracing::info!(
            user_id = %alert.user_id,
            email = %alert.email,
            device_type = %alert.device_type,
            browser = %alert.browser,
            os = %alert.operating_system,
            ip = %alert.ip_address,
            location = %alert.location,
            login_time = %alert.login_time,
            "New device login alert"
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "tracing"
    }
}
