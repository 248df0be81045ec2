pub mod action_status;
pub mod action_type;
pub mod alert_state;
pub mod entity_type;
pub mod idempotency;
pub mod metrics;
pub mod outcome_status;
pub mod plan_tier;
pub mod rule_mode;
pub mod rule_type;
pub mod run_status;
pub mod severity;
pub mod targeting;
pub mod time_range;
