use std::sync::Arc;

use crate::domain::ports::event_sink::{AutomationEvent, EventSink};

/// Fans events out to every configured sink. Delivery problems are logged
/// and swallowed so a flaky dispatcher never fails a batch.
#[derive(Clone, Default)]
pub struct Notifier {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl Notifier {
    pub fn new(sinks: Vec<Arc<dyn EventSink>>) -> Self {
        Self { sinks }
    }

    pub async fn emit(&self, event: AutomationEvent) {
        for sink in &self.sinks {
            if let Err(e) = sink.emit(&event).await {
                tracing::warn!(sink = sink.name(), event = event.kind(), error = %e, "event delivery failed");
            }
        }
    }
}
