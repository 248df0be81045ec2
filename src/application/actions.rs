use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;

use crate::domain::entities::queued_action::{ActionPayload, QueuedAction};
use crate::domain::error::DomainError;
use crate::domain::ports::action_queue::{ActionFilter, ActionQueue};
use crate::domain::values::action_status::ActionOrigin;
use crate::domain::values::action_type::ActionType;

/// A user-initiated change, queued without a rule.
#[derive(Debug, Clone, Deserialize)]
pub struct ManualAction {
    pub profile_id: String,
    pub user_id: String,
    pub action_type: ActionType,
    pub payload: ActionPayload,
    /// Defaults to a fresh UUID, so identical submissions are distinct actions.
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

pub struct ActionsUseCase {
    queue: Arc<dyn ActionQueue>,
}

impl ActionsUseCase {
    pub fn new(queue: Arc<dyn ActionQueue>) -> Self {
        Self { queue }
    }

    /// Returns the stored action; for a repeated key, the one already queued.
    pub fn enqueue_manual(&self, manual: ManualAction) -> Result<QueuedAction, DomainError> {
        manual.payload.validate(manual.action_type)?;
        let key = manual
            .idempotency_key
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let action = QueuedAction::new(
            None,
            None,
            ActionOrigin::Manual,
            manual.profile_id,
            manual.user_id,
            manual.action_type,
            manual.payload,
            key,
            Utc::now(),
        );
        if self.queue.enqueue(&action)? {
            tracing::info!(action_id = %action.id, action_type = %action.action_type, "manual action queued");
            return Ok(action);
        }
        self.queue
            .get_by_key(&action.idempotency_key)?
            .ok_or_else(|| DomainError::NotFound(format!("action with key {}", action.idempotency_key)))
    }

    pub fn get(&self, id: &str) -> Result<QueuedAction, DomainError> {
        self.queue
            .get(id)?
            .ok_or_else(|| DomainError::NotFound(format!("action {id}")))
    }

    pub fn list(&self, filter: &ActionFilter) -> Result<Vec<QueuedAction>, DomainError> {
        self.queue.list(filter)
    }
}
