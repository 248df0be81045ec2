use crate::domain::error::DomainError;
use crate::domain::ports::event_sink::{AutomationEvent, EventSink};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

/// POSTs each event as JSON to the notification dispatcher.
pub struct WebhookEventSink {
    client: Client,
    url: String,
}

impl WebhookEventSink {
    pub fn new(url: String, timeout_secs: u64) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(timeout_secs))
                .build()
                .unwrap_or_default(),
            url,
        }
    }
}

#[async_trait]
impl EventSink for WebhookEventSink {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn emit(&self, event: &AutomationEvent) -> Result<(), DomainError> {
        let resp = self
            .client
            .post(&self.url)
            .json(event)
            .send()
            .await
            .map_err(|e| DomainError::Platform(format!("webhook delivery failed: {e}")))?;
        if !resp.status().is_success() {
            return Err(DomainError::Platform(format!(
                "webhook returned {} for {}",
                resp.status(),
                event.kind()
            )));
        }
        Ok(())
    }
}
