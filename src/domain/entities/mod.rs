pub mod action_outcome;
pub mod alert;
pub mod automation_rule;
pub mod protected_entity;
pub mod queued_action;
pub mod rule_run;
