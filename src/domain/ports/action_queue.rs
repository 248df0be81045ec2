//! Durable queue of pending platform changes.

use crate::domain::entities::action_outcome::ActionOutcome;
use crate::domain::entities::queued_action::{BeforeState, QueuedAction};
use crate::domain::error::DomainError;
use crate::domain::values::action_status::ActionStatus;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Default)]
pub struct ActionFilter {
    pub status: Option<ActionStatus>,
    pub rule_id: Option<String>,
    pub limit: Option<usize>,
}

pub trait ActionQueue: Send + Sync {
    /// Insert keyed on `idempotency_key`. A duplicate key returns `Ok(false)`
    /// and writes nothing.
    fn enqueue(&self, action: &QueuedAction) -> Result<bool, DomainError>;

    /// Atomically claim up to `batch_size` of the oldest queued actions for
    /// `worker_id`. No action is handed to two callers while its claim is live.
    /// Each returned action carries its claim token in `claimed_by`.
    fn dequeue(
        &self,
        batch_size: usize,
        worker_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<QueuedAction>, DomainError>;

    fn get(&self, id: &str) -> Result<Option<QueuedAction>, DomainError>;
    fn get_by_key(&self, idempotency_key: &str) -> Result<Option<QueuedAction>, DomainError>;
    fn list(&self, filter: &ActionFilter) -> Result<Vec<QueuedAction>, DomainError>;

    /// `queued -> applying` while `claim` still holds the action. `Ok(false)`
    /// means another worker took it over after the lease ran out. An
    /// `applying` action is never claimed again.
    fn begin_apply(&self, id: &str, claim: &str, now: DateTime<Utc>) -> Result<bool, DomainError>;

    /// `applying -> applied`, committed together with the pending outcome.
    fn mark_applied(
        &self,
        id: &str,
        claim: &str,
        before_state: &BeforeState,
        attempts: u32,
        outcome: &ActionOutcome,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError>;
    fn mark_failed(
        &self,
        id: &str,
        claim: &str,
        error: &str,
        attempts: u32,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError>;
    fn mark_skipped(&self, id: &str, claim: &str, reason: &str, now: DateTime<Utc>) -> Result<(), DomainError>;
    /// `applied -> reverted`; `false` when the action was not applied.
    fn mark_reverted(&self, id: &str, now: DateTime<Utc>) -> Result<bool, DomainError>;

    fn last_applied_at(&self, rule_id: &str) -> Result<Option<DateTime<Utc>>, DomainError>;
    /// Actions of a rule applied since `since`, plus ones created since then
    /// still queued or being applied.
    fn count_admitted_since(&self, rule_id: &str, since: DateTime<Utc>) -> Result<usize, DomainError>;
}
