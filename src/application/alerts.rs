use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;

use crate::application::protection::ProtectedEntityGuard;
use crate::domain::entities::alert::Alert;
use crate::domain::entities::queued_action::QueuedAction;
use crate::domain::error::DomainError;
use crate::domain::ports::action_queue::ActionQueue;
use crate::domain::ports::alert_repository::{AlertFilter, AlertRepository};
use crate::domain::ports::rule_repository::RuleRepository;
use crate::domain::values::action_status::ActionOrigin;
use crate::domain::values::alert_state::AlertState;

pub struct AlertsUseCase {
    alerts: Arc<dyn AlertRepository>,
    rules: Arc<dyn RuleRepository>,
    queue: Arc<dyn ActionQueue>,
    guard: Arc<ProtectedEntityGuard>,
}

#[derive(Debug, Serialize)]
pub struct ApprovalReport {
    pub alert_id: String,
    pub enqueued: Vec<String>,
    /// Proposals whose key was already on the queue.
    pub duplicates: usize,
}

impl AlertsUseCase {
    pub fn new(
        alerts: Arc<dyn AlertRepository>,
        rules: Arc<dyn RuleRepository>,
        queue: Arc<dyn ActionQueue>,
        guard: Arc<ProtectedEntityGuard>,
    ) -> Self {
        Self {
            alerts,
            rules,
            queue,
            guard,
        }
    }

    pub fn list(&self, filter: &AlertFilter) -> Result<Vec<Alert>, DomainError> {
        self.alerts.list(filter)
    }

    pub fn get(&self, id: &str) -> Result<Alert, DomainError> {
        self.alerts
            .get(id)?
            .ok_or_else(|| DomainError::NotFound(format!("alert {id}")))
    }

    pub fn acknowledge(&self, id: &str) -> Result<Alert, DomainError> {
        self.move_to(id, AlertState::Acknowledged)
    }

    pub fn mute(&self, id: &str) -> Result<Alert, DomainError> {
        self.move_to(id, AlertState::Muted)
    }

    fn move_to(&self, id: &str, next: AlertState) -> Result<Alert, DomainError> {
        let mut alert = self.get(id)?;
        let from = alert.state;
        alert.transition(next, Utc::now())?;
        if !self.alerts.transition(id, from, next, alert.updated_at)? {
            // Someone else moved it between read and write.
            let current = self.get(id)?;
            return Err(DomainError::IllegalTransition {
                entity: "alert",
                from: current.state.to_string(),
                to: next.to_string(),
            });
        }
        Ok(alert)
    }

    /// Queue the actions a suggestion-mode alert proposed, under the keys the
    /// evaluator derived, then acknowledge the alert.
    pub fn approve(&self, id: &str) -> Result<ApprovalReport, DomainError> {
        let alert = self.get(id)?;
        if !alert.state.is_open() {
            return Err(DomainError::Validation(format!(
                "alert {id} is {} and can no longer be approved",
                alert.state
            )));
        }
        if alert.protected {
            return Err(DomainError::Validation(format!(
                "alert {id} matched a protected entity; its actions cannot be approved"
            )));
        }
        if alert.proposed_actions.is_empty() {
            return Err(DomainError::Validation(format!("alert {id} has no proposed actions")));
        }

        let rule = self
            .rules
            .get(&alert.rule_id)?
            .ok_or_else(|| DomainError::NotFound(format!("rule {}", alert.rule_id)))?;

        for proposal in &alert.proposed_actions {
            if let Some(entity) = self.guard.first_protected(&proposal.payload.lineage())? {
                return Err(DomainError::Validation(format!(
                    "alert {id} touches protected entity {entity}"
                )));
            }
        }

        let now = Utc::now();
        let mut report = ApprovalReport {
            alert_id: alert.id.clone(),
            enqueued: Vec::new(),
            duplicates: 0,
        };
        for proposal in &alert.proposed_actions {
            let action = QueuedAction::new(
                Some(rule.id.clone()),
                Some(rule.rule_type()),
                ActionOrigin::Approved,
                rule.profile_id.clone(),
                rule.user_id.clone(),
                proposal.action_type,
                proposal.payload.clone(),
                proposal.idempotency_key.clone(),
                now,
            );
            if self.queue.enqueue(&action)? {
                report.enqueued.push(action.id);
            } else {
                report.duplicates += 1;
            }
        }

        if alert.state == AlertState::New {
            self.alerts
                .transition(id, AlertState::New, AlertState::Acknowledged, now)?;
        }
        tracing::info!(alert_id = id, enqueued = report.enqueued.len(), duplicates = report.duplicates, "suggestion approved");
        Ok(report)
    }
}
