use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::application::outcome_scoring::OutcomeScorer;
use crate::domain::entities::action_outcome::ActionOutcome;
use crate::domain::error::DomainError;
use crate::domain::ports::action_queue::ActionQueue;
use crate::domain::ports::metrics_source::MetricsSource;
use crate::domain::ports::outcome_repository::OutcomeRepository;
use crate::domain::values::action_status::ActionStatus;
use crate::domain::values::outcome_status::OutcomeStatus;

pub struct CollectOutcomesUseCase {
    outcomes: Arc<dyn OutcomeRepository>,
    queue: Arc<dyn ActionQueue>,
    metrics: Arc<dyn MetricsSource>,
    scorer: OutcomeScorer,
}

#[derive(Debug, Default, Serialize)]
pub struct CollectionSummary {
    pub due: usize,
    pub collected: usize,
    pub positive: usize,
    pub neutral: usize,
    pub negative: usize,
    pub inconclusive: usize,
    /// Completed by a concurrent collector between selection and update.
    pub already_collected: usize,
    pub errors: Vec<String>,
}

impl CollectOutcomesUseCase {
    pub fn new(
        outcomes: Arc<dyn OutcomeRepository>,
        queue: Arc<dyn ActionQueue>,
        metrics: Arc<dyn MetricsSource>,
        scorer: OutcomeScorer,
    ) -> Self {
        Self {
            outcomes,
            queue,
            metrics,
            scorer,
        }
    }

    pub fn collect_due(&self, now: DateTime<Utc>, limit: usize) -> Result<CollectionSummary, DomainError> {
        let due = self.outcomes.due(now, limit)?;
        let mut summary = CollectionSummary {
            due: due.len(),
            ..Default::default()
        };

        for outcome in due {
            let outcome_id = outcome.id.clone();
            match self.collect_one(outcome, now) {
                Ok(Some(status)) => {
                    summary.collected += 1;
                    match status {
                        OutcomeStatus::Positive => summary.positive += 1,
                        OutcomeStatus::Neutral => summary.neutral += 1,
                        OutcomeStatus::Negative => summary.negative += 1,
                        _ => summary.inconclusive += 1,
                    }
                }
                Ok(None) => summary.already_collected += 1,
                Err(e) => {
                    tracing::warn!(outcome_id = %outcome_id, error = %e, "outcome collection failed");
                    summary.errors.push(format!("{outcome_id}: {e}"));
                }
            }
        }

        if summary.due > 0 {
            tracing::info!(
                due = summary.due,
                collected = summary.collected,
                already_collected = summary.already_collected,
                "outcome collection complete"
            );
        }
        Ok(summary)
    }

    /// `None` when another collector got there first.
    fn collect_one(&self, mut outcome: ActionOutcome, now: DateTime<Utc>) -> Result<Option<OutcomeStatus>, DomainError> {
        let reverted = self
            .queue
            .get(&outcome.action_id)?
            .map(|a| a.status == ActionStatus::Reverted)
            .unwrap_or(false);

        let after = self
            .metrics
            .entity_metrics(&outcome.profile_id, &outcome.entity, &outcome.after_range())?;

        let (score, status) = if reverted {
            (None, OutcomeStatus::Inconclusive)
        } else {
            let score = self.scorer.score(&outcome.before_metrics, &after);
            (score, OutcomeStatus::from_score(score))
        };
        outcome.complete(Some(after), score, status, now)?;

        if self.outcomes.complete_if_pending(&outcome)? == 0 {
            tracing::debug!(outcome_id = %outcome.id, "outcome already collected");
            return Ok(None);
        }
        tracing::debug!(outcome_id = %outcome.id, action_id = %outcome.action_id, status = %status, ?score, "outcome collected");
        Ok(Some(status))
    }
}
