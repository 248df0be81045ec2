use crate::domain::entities::action_outcome::ActionOutcome;
use crate::domain::error::DomainError;
use chrono::{DateTime, Utc};

pub trait OutcomeRepository: Send + Sync {
    fn create(&self, outcome: &ActionOutcome) -> Result<(), DomainError>;
    /// Pending outcomes whose `after_scheduled_at` has passed, oldest first.
    fn due(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<ActionOutcome>, DomainError>;
    /// Write the measurement only if the row is still pending. Returns affected rows.
    fn complete_if_pending(&self, outcome: &ActionOutcome) -> Result<usize, DomainError>;
    fn get_by_action(&self, action_id: &str) -> Result<Option<ActionOutcome>, DomainError>;
    fn list(&self, limit: usize) -> Result<Vec<ActionOutcome>, DomainError>;
}
