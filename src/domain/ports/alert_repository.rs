use crate::domain::entities::alert::Alert;
use crate::domain::error::DomainError;
use crate::domain::values::alert_state::AlertState;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Default)]
pub struct AlertFilter {
    pub rule_id: Option<String>,
    pub state: Option<AlertState>,
    pub limit: Option<usize>,
}

pub trait AlertRepository: Send + Sync {
    /// Insert unless an alert with the same dedupe key exists. Returns whether a row was written.
    fn insert_if_absent(&self, alert: &Alert) -> Result<bool, DomainError>;
    fn get(&self, id: &str) -> Result<Option<Alert>, DomainError>;
    fn list(&self, filter: &AlertFilter) -> Result<Vec<Alert>, DomainError>;
    /// Conditional state change; `false` when the alert was no longer in `from`.
    fn transition(
        &self,
        id: &str,
        from: AlertState,
        to: AlertState,
        now: DateTime<Utc>,
    ) -> Result<bool, DomainError>;
    /// Resolve open alerts of a rule whose entity is not in `still_matching`.
    fn resolve_cleared(
        &self,
        rule_id: &str,
        still_matching: &[String],
        now: DateTime<Utc>,
    ) -> Result<usize, DomainError>;
}
