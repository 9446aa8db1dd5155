use crate::core::{Listing, Notifier, NotifyOutcome};
use crate::domain::model::format_price;
use crate::utils::error::{MonitorError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

pub const DEFAULT_IFTTT_BASE_URL: &str = "https://maker.ifttt.com";
const NOTIFY_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    value1: &'a str,
    value2: String,
    value3: &'a str,
}

/// Posts price alerts to an IFTTT Maker webhook.
pub struct IftttNotifier {
    client: Client,
    base_url: String,
    event: String,
    key: String,
}

impl IftttNotifier {
    pub fn new(base_url: &str, event: &str, key: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            event: event.to_string(),
            key: key.to_string(),
        }
    }

    fn trigger_url(&self) -> String {
        format!(
            "{}/trigger/{}/json/with/key/{}",
            self.base_url, self.event, self.key
        )
    }
}

#[async_trait]
impl Notifier for IftttNotifier {
    async fn notify(&self, listing: &Listing) -> Result<NotifyOutcome> {
        if self.key.is_empty() {
            tracing::warn!("⚠️ IFTTT_KEY missing, notification not sent");
            return Ok(NotifyOutcome::Skipped);
        }

        let payload = WebhookPayload {
            value1: &listing.title,
            value2: format_price(listing.price),
            value3: &listing.url,
        };

        let response = self
            .client
            .post(self.trigger_url())
            .json(&payload)
            .timeout(NOTIFY_TIMEOUT)
            .send()
            .await
            .map_err(|e| MonitorError::NotificationError {
                message: e.without_url().to_string(),
            })?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let preview: String = body.chars().take(200).collect();
        tracing::info!("📣 IFTTT {} {}", status.as_u16(), preview);

        if !status.is_success() {
            return Err(MonitorError::NotificationError {
                message: format!("IFTTT returned HTTP {}", status.as_u16()),
            });
        }
        Ok(NotifyOutcome::Sent {
            status: status.as_u16(),
        })
    }
}
