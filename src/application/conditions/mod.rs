//! Per-rule-type match logic.
//!
//! Each [`RuleCondition`] reads the metrics it needs through the
//! [`ConditionContext`] and reports the entities that crossed its thresholds,
//! together with the platform changes the rule's action implies. Gating,
//! keys and persistence are the evaluator's job.

pub mod bid_adjust;
pub mod budget_depletion;
pub mod placement;
pub mod search_terms;
pub mod spend_spike;

use chrono::{DateTime, NaiveDate, Utc};

use crate::domain::entities::automation_rule::AutomationRule;
use crate::domain::entities::queued_action::ActionPayload;
use crate::domain::error::DomainError;
use crate::domain::ports::metrics_source::MetricsSource;
use crate::domain::values::action_type::ActionType;
use crate::domain::values::entity_type::EntityRef;
use crate::domain::values::rule_type::RuleType;
use crate::domain::values::time_range::{DateRange, ProfileClock, TimeRange};

/// Everything a condition may look at while evaluating one rule.
pub struct ConditionContext<'a> {
    pub rule: &'a AutomationRule,
    pub window: TimeRange,
    pub clock: ProfileClock,
    pub metrics: &'a dyn MetricsSource,
}

impl<'a> ConditionContext<'a> {
    pub fn new(rule: &'a AutomationRule, window: TimeRange, metrics: &'a dyn MetricsSource) -> Self {
        Self {
            rule,
            window,
            clock: ProfileClock::new(rule.profile_utc_offset_minutes),
            metrics,
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.window.end
    }

    /// Profile-local date of the evaluation.
    pub fn today(&self) -> NaiveDate {
        self.clock.local_date(self.window.end)
    }

    /// Report dates covered by the window, ending today.
    pub fn report_range(&self) -> DateRange {
        DateRange::ending(self.today(), self.window.days().max(1) as u32)
    }
}

/// One entity that crossed the rule's thresholds.
#[derive(Debug, Clone)]
pub struct ConditionMatch {
    /// Distinguishes matches within a rule; feeds the alert and action keys.
    pub match_key: String,
    pub entity: EntityRef,
    /// Entities the proposed changes would touch, checked against protections.
    pub lineage: Vec<EntityRef>,
    pub message: String,
    pub snapshot: serde_json::Value,
    pub changes: Vec<(ActionType, ActionPayload)>,
}

#[derive(Debug, Default)]
pub struct ConditionOutput {
    pub evaluated: usize,
    pub matches: Vec<ConditionMatch>,
}

pub trait RuleCondition: Send + Sync {
    fn rule_type(&self) -> RuleType;

    fn evaluate(&self, ctx: &ConditionContext) -> Result<ConditionOutput, DomainError>;
}

/// One condition per rule type.
pub fn default_conditions() -> Vec<Box<dyn RuleCondition>> {
    vec![
        Box::new(budget_depletion::BudgetDepletion),
        Box::new(spend_spike::SpendSpike),
        Box::new(search_terms::SearchTermHarvest),
        Box::new(search_terms::SearchTermPrune),
        Box::new(bid_adjust::BidAdjust::down()),
        Box::new(bid_adjust::BidAdjust::up()),
        Box::new(placement::PlacementOpt),
    ]
}

pub(crate) fn params_mismatch(expected: RuleType, rule: &AutomationRule) -> DomainError {
    DomainError::Validation(format!(
        "rule {} has {} params but was routed to the {expected} condition",
        rule.id,
        rule.rule_type()
    ))
}

/// Round a currency amount to whole cents.
pub(crate) fn round_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}
