//! Plan tier to auto-apply permissions, kept in one table so the evaluator
//! and the executor cannot drift apart.

use crate::domain::values::plan_tier::PlanTier;
use crate::domain::values::rule_type::RuleType;

const POLICY: &[(PlanTier, &[RuleType])] = &[
    (PlanTier::Free, &[]),
    (
        PlanTier::Pro,
        &[RuleType::SearchTermHarvest, RuleType::SearchTermPrune],
    ),
    (PlanTier::Agency, &RuleType::ALL),
];

pub struct EntitlementGate;

impl EntitlementGate {
    /// Whether a plan may let the given automation kind change the account
    /// without a human in the loop.
    pub fn can_auto_apply(plan: PlanTier, rule_type: RuleType) -> bool {
        POLICY
            .iter()
            .find(|(tier, _)| *tier == plan)
            .map(|(_, allowed)| allowed.contains(&rule_type))
            .unwrap_or(false)
    }

    pub fn denial_reason(plan: PlanTier, rule_type: RuleType) -> String {
        format!("entitlement: plan '{plan}' does not allow auto-apply for {rule_type}")
    }
}
