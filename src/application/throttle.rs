use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::domain::entities::automation_rule::AutomationRule;
use crate::domain::error::DomainError;
use crate::domain::ports::action_queue::ActionQueue;
use crate::domain::values::time_range::ProfileClock;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Admission {
    pub allowed: bool,
    pub reason: Option<String>,
}

impl Admission {
    fn allow() -> Self {
        Self {
            allowed: true,
            reason: None,
        }
    }

    fn deny(reason: String) -> Self {
        Self {
            allowed: false,
            reason: Some(reason),
        }
    }
}

/// Per-rule cooldown and daily cap, computed from the durable action log on
/// every call so decisions agree across processes.
pub struct ThrottleGovernor {
    queue: Arc<dyn ActionQueue>,
}

impl ThrottleGovernor {
    pub fn new(queue: Arc<dyn ActionQueue>) -> Self {
        Self { queue }
    }

    pub fn admit(&self, rule: &AutomationRule, now: DateTime<Utc>) -> Result<Admission, DomainError> {
        let policy = rule.throttle;

        if policy.cooldown_hours > 0 {
            if let Some(last) = self.queue.last_applied_at(&rule.id)? {
                let cooldown = Duration::hours(policy.cooldown_hours as i64);
                if now - last < cooldown {
                    let remaining = (last + cooldown - now).num_minutes();
                    return Ok(Admission::deny(format!(
                        "throttle: cooldown of {}h active, {remaining}m remaining",
                        policy.cooldown_hours
                    )));
                }
            }
        }

        let day_start = ProfileClock::new(rule.profile_utc_offset_minutes).day_start(now);
        let today = self.queue.count_admitted_since(&rule.id, day_start)?;
        if today >= policy.max_actions_per_day as usize {
            return Ok(Admission::deny(format!(
                "throttle: {today} actions today reached maxActionsPerDay={}",
                policy.max_actions_per_day
            )));
        }

        Ok(Admission::allow())
    }
}
