use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;

use crate::domain::entities::automation_rule::{AutomationRule, RuleAction, RuleParams, ThrottlePolicy};
use crate::domain::error::DomainError;
use crate::domain::ports::rule_repository::{RuleFilter, RuleRepository};
use crate::domain::values::rule_mode::RuleMode;
use crate::domain::values::severity::Severity;

/// Rule definition as authored by a user, before ids and timestamps exist.
#[derive(Debug, Clone, Deserialize)]
pub struct NewRule {
    pub user_id: String,
    pub profile_id: String,
    pub name: String,
    #[serde(flatten)]
    pub params: RuleParams,
    #[serde(default = "default_mode")]
    pub mode: RuleMode,
    #[serde(default = "default_severity")]
    pub severity: Severity,
    #[serde(default = "default_action")]
    pub action: RuleAction,
    #[serde(default)]
    pub throttle: ThrottlePolicy,
    #[serde(default)]
    pub profile_utc_offset_minutes: i32,
}

fn default_mode() -> RuleMode {
    RuleMode::DryRun
}
fn default_severity() -> Severity {
    Severity::Warn
}
fn default_action() -> RuleAction {
    RuleAction::AlertOnly
}

impl NewRule {
    pub fn into_rule(self) -> AutomationRule {
        let mut rule = AutomationRule::new(
            self.user_id,
            self.profile_id,
            self.name,
            self.params,
            self.mode,
            self.severity,
            self.action,
            self.throttle,
        );
        rule.profile_utc_offset_minutes = self.profile_utc_offset_minutes;
        rule
    }
}

pub struct RulesUseCase {
    repo: Arc<dyn RuleRepository>,
}

impl RulesUseCase {
    pub fn new(repo: Arc<dyn RuleRepository>) -> Self {
        Self { repo }
    }

    /// Validate params and action against the rule type, then persist.
    pub fn create(&self, rule: AutomationRule) -> Result<AutomationRule, DomainError> {
        rule.validate()?;
        self.repo.add(&rule)?;
        tracing::info!(rule_id = %rule.id, rule_type = %rule.rule_type(), mode = %rule.mode, "rule created");
        Ok(rule)
    }

    pub fn update(&self, mut rule: AutomationRule) -> Result<AutomationRule, DomainError> {
        rule.validate()?;
        rule.updated_at = Utc::now();
        self.repo.update(&rule)?;
        Ok(rule)
    }

    pub fn get(&self, id: &str) -> Result<AutomationRule, DomainError> {
        self.repo
            .get(id)?
            .ok_or_else(|| DomainError::NotFound(format!("rule {id}")))
    }

    pub fn list(&self, filter: &RuleFilter) -> Result<Vec<AutomationRule>, DomainError> {
        self.repo.list(filter)
    }

    pub fn enable(&self, id: &str) -> Result<AutomationRule, DomainError> {
        self.repo.set_enabled(id, true, None)?;
        self.get(id)
    }

    pub fn disable(&self, id: &str, reason: Option<&str>) -> Result<AutomationRule, DomainError> {
        self.repo.set_enabled(id, false, reason)?;
        self.get(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rule_defaults_to_dry_run_alerts() {
        let json = r#"{
            "user_id": "u1",
            "profile_id": "p1",
            "name": "Spend watch",
            "rule_type": "spend_spike",
            "params": {"lookbackDays": 7}
        }"#;
        let rule = serde_json::from_str::<NewRule>(json).unwrap().into_rule();
        assert_eq!(rule.mode, RuleMode::DryRun);
        assert_eq!(rule.action, RuleAction::AlertOnly);
        assert!(rule.enabled);
        assert!(rule.validate().is_ok());
    }
}
