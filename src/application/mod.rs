pub mod actions;
pub mod alerts;
pub mod collect_outcomes;
pub mod conditions;
pub mod entitlement;
pub mod evaluate_rules;
pub mod evaluator;
pub mod execute_actions;
pub mod notifier;
pub mod outcome_scoring;
pub mod protection;
pub mod rules;
pub mod throttle;
