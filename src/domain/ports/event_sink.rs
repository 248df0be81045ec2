use crate::domain::error::DomainError;
use crate::domain::values::action_type::ActionType;
use crate::domain::values::run_status::RunStatus;
use async_trait::async_trait;
use serde::Serialize;

/// Structured events handed to the notification dispatcher. Formatting and
/// delivery happen outside this crate.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AutomationEvent {
    RuleRunCompleted {
        rule_id: String,
        run_id: String,
        profile_id: String,
        status: RunStatus,
        alerts_created: usize,
        actions_enqueued: usize,
        error: Option<String>,
    },
    ActionFailed {
        action_id: String,
        rule_id: Option<String>,
        profile_id: String,
        action_type: ActionType,
        error: String,
    },
    RuleAutoDisabled {
        rule_id: String,
        profile_id: String,
        consecutive_failures: usize,
    },
}

impl AutomationEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            AutomationEvent::RuleRunCompleted { .. } => "rule_run_completed",
            AutomationEvent::ActionFailed { .. } => "action_failed",
            AutomationEvent::RuleAutoDisabled { .. } => "rule_auto_disabled",
        }
    }
}

#[async_trait]
pub trait EventSink: Send + Sync {
    fn name(&self) -> &str;
    async fn emit(&self, event: &AutomationEvent) -> Result<(), DomainError>;
}
