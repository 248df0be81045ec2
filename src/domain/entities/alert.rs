use crate::domain::entities::queued_action::ProposedAction;
use crate::domain::error::DomainError;
use crate::domain::values::alert_state::AlertState;
use crate::domain::values::entity_type::EntityRef;
use crate::domain::values::severity::Severity;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    pub rule_id: String,
    pub profile_id: String,
    pub entity: EntityRef,
    pub severity: Severity,
    pub message: String,
    pub metric_snapshot: serde_json::Value,
    /// Actions awaiting approval (suggestion mode) or suppressed by protection.
    pub proposed_actions: Vec<ProposedAction>,
    /// Set when a protected entity kept the proposal out of the queue.
    pub protected: bool,
    pub state: AlertState,
    pub dedupe_key: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Alert {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        rule_id: &str,
        profile_id: &str,
        entity: EntityRef,
        severity: Severity,
        message: String,
        metric_snapshot: serde_json::Value,
        dedupe_key: String,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            rule_id: rule_id.to_string(),
            profile_id: profile_id.to_string(),
            entity,
            severity,
            message,
            metric_snapshot,
            proposed_actions: Vec::new(),
            protected: false,
            state: AlertState::New,
            dedupe_key,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn transition(&mut self, next: AlertState, now: DateTime<Utc>) -> Result<(), DomainError> {
        if !self.state.can_transition_to(next) {
            return Err(DomainError::IllegalTransition {
                entity: "alert",
                from: self.state.to_string(),
                to: next.to_string(),
            });
        }
        self.state = next;
        self.updated_at = now;
        Ok(())
    }
}
