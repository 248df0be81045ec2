use crate::domain::entities::automation_rule::AutomationRule;
use crate::domain::error::DomainError;

#[derive(Debug, Clone, Default)]
pub struct RuleFilter {
    pub profile_id: Option<String>,
    pub enabled: Option<bool>,
}

/// Rule definitions authored by users. The evaluator only reads them; the
/// one write it performs is the auto-disable toggle.
pub trait RuleRepository: Send + Sync {
    fn add(&self, rule: &AutomationRule) -> Result<(), DomainError>;
    fn update(&self, rule: &AutomationRule) -> Result<(), DomainError>;
    fn get(&self, id: &str) -> Result<Option<AutomationRule>, DomainError>;
    fn list(&self, filter: &RuleFilter) -> Result<Vec<AutomationRule>, DomainError>;
    fn set_enabled(&self, id: &str, enabled: bool, reason: Option<&str>) -> Result<(), DomainError>;
}
