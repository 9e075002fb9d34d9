use super::{Notification, Notifier};
use crate::types::{AppError, Result};
use async_trait::async_trait;
use std::time::Duration;

/// Posts notifications as JSON to a configured endpoint
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Notification(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, notification: &Notification) -> Result<()> {
        let response = self
            .client
            .post(&self.url)
            .json(notification)
            .send()
            .await
            .map_err(|e| AppError::Notification(format!("Webhook request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::Notification(format!(
                "Webhook returned {} for {}",
                response.status(),
                notification.recipient
            )));
        }

        Ok(())
    }
}
