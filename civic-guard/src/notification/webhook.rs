//! Webhook notifier
//!
//! Posts JSON-serialized alerts to a configured HTTP endpoint. No retries:
//! a failed delivery is reported to the dispatcher, which logs it.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use super::{AccountLockedAlert, NewDeviceAlert, SecurityNotifier, WebhookConfig};
use crate::error::{Error, Result};

/// Wire envelope, tagged with the alert kind
#[derive(Debug, Serialize)]
#[serde(tag = "type", content = "alert", rename_all = "snake_case")]
enum WebhookPayload<'a> {
    AccountLocked(&'a AccountLockedAlert),
    NewDevice(&'a NewDeviceAlert),
}

/// Notifier that POSTs alerts as JSON
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
    headers: HashMap<String, String>,
}

impl WebhookNotifier {
    /// Create a new webhook notifier
    ///
    /// # Arguments
    ///
    /// * `url`: Destination URL for POST requests
    /// * `timeout`: HTTP request timeout
    /// * `headers`: Additional headers to include (e.g., `Authorization`)
    pub fn new(url: String, timeout: Duration, headers: HashMap<String, String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self {
            client,
            url,
            headers,
        }
    }

    /// Build from a `[[notification.webhooks]]` entry
    pub fn from_config(config: &WebhookConfig) -> Self {
        Self::new(
            config.url.clone(),
            Duration::from_secs(config.timeout_secs),
            config.headers.clone(),
        )
    }

    async fn post(&self, payload: WebhookPayload<'_>) -> Result<()> {
        let mut request = self.client.post(&self.url).json(&payload);
        for (key, value) in &self.headers {
            request = request.header(key.as_str(), value.as_str());
        }

        let response = request.send().await.map_err(|e| {
            Error::Notification(format!("Webhook {} unreachable: {}", self.url, e))
        })?;

        if !response.status().is_success() {
            return Err(Error::Notification(format!(
                "Webhook {} returned {}",
                self.url,
                response.status()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl SecurityNotifier for WebhookNotifier {
    async fn send_account_locked_alert(&self, alert: &AccountLockedAlert) -> Result<()> {
        self.post(WebhookPayload::AccountLocked(alert)).await
    }

    async fn send_new_device_alert(&self, alert: &NewDeviceAlert) -> Result<()> {
        self.post(WebhookPayload::NewDevice(alert)).await
    }

    fn name(&self) -> &str {
        &self.url
    }
}
