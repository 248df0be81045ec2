pub mod action_queue;
pub mod ads_platform;
pub mod alert_repository;
pub mod event_sink;
pub mod metrics_source;
pub mod outcome_repository;
pub mod plan_source;
pub mod protected_entity_repository;
pub mod rule_repository;
pub mod run_repository;
