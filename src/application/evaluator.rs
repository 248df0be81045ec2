//! Rule Evaluator: turns one rule plus a metrics window into alerts and
//! proposed actions. Pure with respect to the queue; persistence happens in
//! the evaluate-rules use case.

use std::sync::Arc;

use serde::Serialize;

use crate::application::conditions::{default_conditions, ConditionContext, RuleCondition};
use crate::application::protection::ProtectedEntityGuard;
use crate::domain::entities::alert::Alert;
use crate::domain::entities::automation_rule::AutomationRule;
use crate::domain::entities::queued_action::ProposedAction;
use crate::domain::error::DomainError;
use crate::domain::ports::metrics_source::MetricsSource;
use crate::domain::values::idempotency::{action_key, alert_key};
use crate::domain::values::rule_mode::RuleMode;
use crate::domain::values::time_range::TimeRange;

#[derive(Debug, Default, Serialize)]
pub struct Evaluation {
    pub alerts: Vec<Alert>,
    /// Actions eligible for the queue. Empty unless the rule is in auto mode.
    pub proposed: Vec<ProposedAction>,
    pub evaluated: usize,
    /// `type:id` of every matched entity, protected or not.
    pub matched_entities: Vec<String>,
}

pub struct RuleEvaluator {
    metrics: Arc<dyn MetricsSource>,
    guard: Arc<ProtectedEntityGuard>,
    conditions: Vec<Box<dyn RuleCondition>>,
}

impl RuleEvaluator {
    pub fn new(metrics: Arc<dyn MetricsSource>, guard: Arc<ProtectedEntityGuard>) -> Self {
        Self::with_conditions(metrics, guard, default_conditions())
    }

    pub fn with_conditions(
        metrics: Arc<dyn MetricsSource>,
        guard: Arc<ProtectedEntityGuard>,
        conditions: Vec<Box<dyn RuleCondition>>,
    ) -> Self {
        Self {
            metrics,
            guard,
            conditions,
        }
    }

    pub fn evaluate(&self, rule: &AutomationRule, window: TimeRange) -> Result<Evaluation, DomainError> {
        let condition = self
            .conditions
            .iter()
            .find(|c| c.rule_type() == rule.rule_type())
            .ok_or_else(|| {
                DomainError::Validation(format!("no condition registered for {}", rule.rule_type()))
            })?;

        let ctx = ConditionContext::new(rule, window, self.metrics.as_ref());
        let window_day = ctx.today();
        let output = condition.evaluate(&ctx)?;

        let mut evaluation = Evaluation {
            evaluated: output.evaluated,
            ..Default::default()
        };

        for m in output.matches {
            let proposals: Vec<ProposedAction> = m
                .changes
                .into_iter()
                .map(|(action_type, payload)| ProposedAction {
                    idempotency_key: action_key(&rule.id, &m.match_key, action_type.as_str(), window_day),
                    entity: payload.subject(action_type).unwrap_or_else(|| m.entity.clone()),
                    action_type,
                    payload,
                })
                .collect();

            let protected_by = self.guard.first_protected(&m.lineage)?;

            let mut alert = Alert::new(
                &rule.id,
                &rule.profile_id,
                m.entity.clone(),
                rule.severity,
                m.message,
                m.snapshot,
                alert_key(&rule.id, &m.match_key, window_day),
                window.end,
            );
            evaluation.matched_entities.push(m.entity.to_string());

            if let Some(entity) = protected_by {
                tracing::info!(rule_id = %rule.id, %entity, "match on protected entity, actions suppressed");
                alert.protected = true;
                alert.proposed_actions = proposals;
                alert.message = format!("{} [protected: {entity}]", alert.message);
            } else {
                match rule.mode {
                    RuleMode::DryRun => {}
                    RuleMode::Suggestion => alert.proposed_actions = proposals,
                    RuleMode::Auto => evaluation.proposed.extend(proposals),
                }
            }
            evaluation.alerts.push(alert);
        }

        Ok(evaluation)
    }
}
