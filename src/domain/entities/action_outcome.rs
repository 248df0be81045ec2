use crate::domain::error::DomainError;
use crate::domain::values::entity_type::EntityRef;
use crate::domain::values::metrics::{EntityMetrics, MetricDelta};
use crate::domain::values::outcome_status::OutcomeStatus;
use crate::domain::values::time_range::DateRange;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Delayed effectiveness measurement for one applied action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionOutcome {
    pub id: String,
    pub action_id: String,
    pub profile_id: String,
    pub entity: EntityRef,
    pub lookback_days: u32,
    pub before_metrics: EntityMetrics,
    pub after_scheduled_at: DateTime<Utc>,
    pub after_metrics: Option<EntityMetrics>,
    pub metric_delta: Option<MetricDelta>,
    pub outcome_score: Option<f64>,
    pub outcome_status: OutcomeStatus,
    pub created_at: DateTime<Utc>,
    pub collected_at: Option<DateTime<Utc>>,
}

impl ActionOutcome {
    pub fn pending(
        action_id: &str,
        profile_id: &str,
        entity: EntityRef,
        before_metrics: EntityMetrics,
        applied_at: DateTime<Utc>,
        lookback_days: u32,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            action_id: action_id.to_string(),
            profile_id: profile_id.to_string(),
            entity,
            lookback_days,
            before_metrics,
            after_scheduled_at: applied_at + Duration::days(lookback_days as i64),
            after_metrics: None,
            metric_delta: None,
            outcome_score: None,
            outcome_status: OutcomeStatus::Pending,
            created_at: applied_at,
            collected_at: None,
        }
    }

    /// Full days before the apply date, used for the before snapshot.
    pub fn before_range(applied_at: DateTime<Utc>, lookback_days: u32) -> DateRange {
        DateRange::ending(applied_at.date_naive() - Duration::days(1), lookback_days)
    }

    /// As many days as the before window, ending the day before the scheduled
    /// collection date so every day in it is complete when collected.
    pub fn after_range(&self) -> DateRange {
        DateRange::ending(
            self.after_scheduled_at.date_naive() - Duration::days(1),
            self.lookback_days,
        )
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.outcome_status == OutcomeStatus::Pending && self.after_scheduled_at <= now
    }

    /// Fill in the measurement. Allowed exactly once, from `Pending`.
    pub fn complete(
        &mut self,
        after: Option<EntityMetrics>,
        score: Option<f64>,
        status: OutcomeStatus,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        if !self.outcome_status.can_transition_to(status) {
            return Err(DomainError::IllegalTransition {
                entity: "outcome",
                from: self.outcome_status.to_string(),
                to: status.to_string(),
            });
        }
        self.metric_delta = after.map(|a| self.before_metrics.delta(&a));
        self.after_metrics = after;
        self.outcome_score = score;
        self.outcome_status = status;
        self.collected_at = Some(now);
        Ok(())
    }
}
