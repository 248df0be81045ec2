use crate::domain::error::DomainError;
use crate::domain::ports::event_sink::{AutomationEvent, EventSink};
use async_trait::async_trait;

/// Writes automation events to the tracing pipeline.
pub struct LogEventSink;

#[async_trait]
impl EventSink for LogEventSink {
    fn name(&self) -> &str {
        "log"
    }

    async fn emit(&self, event: &AutomationEvent) -> Result<(), DomainError> {
        let payload = serde_json::to_string(event)
            .map_err(|e| DomainError::Parse(format!("event encode failed: {e}")))?;
        match event {
            AutomationEvent::RuleRunCompleted { error: None, .. } => {
                tracing::info!(event = event.kind(), %payload, "automation event")
            }
            _ => tracing::warn!(event = event.kind(), %payload, "automation event"),
        }
        Ok(())
    }
}
