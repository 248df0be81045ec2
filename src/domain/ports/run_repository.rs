use crate::domain::entities::rule_run::RuleRun;
use crate::domain::error::DomainError;
use crate::domain::values::run_status::RunStatus;

pub trait RunRepository: Send + Sync {
    fn insert(&self, run: &RuleRun) -> Result<(), DomainError>;
    /// Persist the final state of a running run. Finished runs are never rewritten.
    fn finish(&self, run: &RuleRun) -> Result<(), DomainError>;
    /// Statuses of the most recent finished runs of a rule, newest first.
    fn recent_statuses(&self, rule_id: &str, limit: usize) -> Result<Vec<RunStatus>, DomainError>;
    fn list(&self, rule_id: Option<&str>, limit: usize) -> Result<Vec<RuleRun>, DomainError>;
}
