//! Action executor: drains the queue, re-checks policy, applies each change
//! on the ads platform and schedules its outcome measurement.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::application::entitlement::EntitlementGate;
use crate::application::notifier::Notifier;
use crate::application::protection::ProtectedEntityGuard;
use crate::config::AutomationConfig;
use crate::domain::entities::action_outcome::ActionOutcome;
use crate::domain::entities::queued_action::{ActionPayload, BeforeState, QueuedAction};
use crate::domain::error::DomainError;
use crate::domain::ports::action_queue::ActionQueue;
use crate::domain::ports::ads_platform::{AdsPlatform, ApplyReceipt, ChangeRequest, PlatformError};
use crate::domain::ports::event_sink::AutomationEvent;
use crate::domain::ports::metrics_source::MetricsSource;
use crate::domain::ports::plan_source::PlanSource;
use crate::domain::values::action_status::{ActionOrigin, ActionStatus};
use crate::domain::values::action_type::ActionType;
use crate::domain::values::entity_type::EntityRef;
use crate::domain::values::metrics::EntityMetrics;

#[derive(Debug, Clone)]
pub struct ExecutorSettings {
    pub batch_size: usize,
    pub max_attempts: u32,
    pub backoff_base: Duration,
    pub api_timeout: Duration,
    pub inter_action_delay: Duration,
    pub outcome_lookback_days: u32,
}

impl ExecutorSettings {
    pub fn from_config(config: &AutomationConfig) -> Self {
        Self {
            batch_size: config.batch_size,
            max_attempts: config.max_attempts.max(1),
            backoff_base: Duration::from_millis(config.backoff_base_ms),
            api_timeout: Duration::from_secs(config.api_timeout_secs),
            inter_action_delay: Duration::from_millis(config.inter_action_delay_ms),
            outcome_lookback_days: config.outcome_lookback_days,
        }
    }
}

#[derive(Debug, Default, Serialize)]
pub struct ExecutionSummary {
    pub processed: usize,
    pub successful: usize,
    pub failed: usize,
    pub skipped: usize,
    pub errors: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct RevertReport {
    pub action_id: String,
    pub reverted: bool,
    pub status: ActionStatus,
}

enum Disposition {
    Applied,
    /// The platform took the change but the bookkeeping write failed.
    AppliedUnrecorded(String),
    Failed,
    Skipped,
    /// Another worker took the action over after this claim's lease ran out.
    ClaimLost,
}

/// What an action needs before its platform call.
enum Prepared {
    Ready {
        change: ChangeRequest,
        subject: EntityRef,
        before_metrics: EntityMetrics,
    },
    Denied(String),
}

pub struct ExecuteActionsUseCase {
    queue: Arc<dyn ActionQueue>,
    metrics: Arc<dyn MetricsSource>,
    plans: Arc<dyn PlanSource>,
    guard: Arc<ProtectedEntityGuard>,
    platform: Arc<dyn AdsPlatform>,
    notifier: Notifier,
    settings: ExecutorSettings,
    worker_id: String,
}

impl ExecuteActionsUseCase {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        queue: Arc<dyn ActionQueue>,
        metrics: Arc<dyn MetricsSource>,
        plans: Arc<dyn PlanSource>,
        guard: Arc<ProtectedEntityGuard>,
        platform: Arc<dyn AdsPlatform>,
        notifier: Notifier,
        settings: ExecutorSettings,
    ) -> Self {
        Self {
            queue,
            metrics,
            plans,
            guard,
            platform,
            notifier,
            settings,
            worker_id: format!("worker-{}", std::process::id()),
        }
    }

    pub fn settings(&self) -> &ExecutorSettings {
        &self.settings
    }

    /// Claim up to `batch_size` queued actions and drive each to a terminal
    /// state. Each action commits on its own; a failure never aborts the batch.
    pub async fn process_batch(&self, batch_size: Option<usize>) -> Result<ExecutionSummary, DomainError> {
        let batch_size = batch_size.unwrap_or(self.settings.batch_size);
        let actions = self.queue.dequeue(batch_size, &self.worker_id, Utc::now())?;

        let mut summary = ExecutionSummary::default();
        for (i, action) in actions.iter().enumerate() {
            if i > 0 && !self.settings.inter_action_delay.is_zero() {
                tokio::time::sleep(self.settings.inter_action_delay).await;
            }
            match self.process_one(action).await {
                Ok(Disposition::ClaimLost) => continue,
                Ok(Disposition::Applied) => summary.successful += 1,
                Ok(Disposition::AppliedUnrecorded(e)) => {
                    summary.successful += 1;
                    summary.errors.push(format!("{}: applied but not recorded: {e}", action.id));
                }
                Ok(Disposition::Failed) => summary.failed += 1,
                Ok(Disposition::Skipped) => summary.skipped += 1,
                Err(e) => {
                    tracing::error!(action_id = %action.id, error = %e, "action bookkeeping failed");
                    summary.failed += 1;
                    summary.errors.push(format!("{}: {e}", action.id));
                }
            }
            summary.processed += 1;
        }

        if summary.processed > 0 {
            tracing::info!(
                processed = summary.processed,
                successful = summary.successful,
                failed = summary.failed,
                skipped = summary.skipped,
                "execution batch complete"
            );
        }
        Ok(summary)
    }

    async fn process_one(&self, action: &QueuedAction) -> Result<Disposition, DomainError> {
        tracing::debug!(action_id = %action.id, action_type = %action.action_type, origin = %action.origin, "processing action");

        let claim = action
            .claimed_by
            .as_deref()
            .ok_or_else(|| DomainError::Validation(format!("action {} was not claimed", action.id)))?;
        // From here on the action is out of the claimable pool for good.
        if !self.queue.begin_apply(&action.id, claim, Utc::now())? {
            tracing::warn!(action_id = %action.id, "claim lost to another worker");
            return Ok(Disposition::ClaimLost);
        }

        let lookback = self.settings.outcome_lookback_days;
        let (change, subject, before_metrics) = match self.prepare(action, Utc::now()) {
            Ok(Prepared::Ready {
                change,
                subject,
                before_metrics,
            }) => (change, subject, before_metrics),
            Ok(Prepared::Denied(reason)) => {
                tracing::warn!(action_id = %action.id, reason = %reason, "action skipped");
                self.queue.mark_skipped(&action.id, claim, &reason, Utc::now())?;
                return Ok(Disposition::Skipped);
            }
            Err(e) => {
                self.fail(action, claim, &e.to_string(), 0).await?;
                return Ok(Disposition::Failed);
            }
        };

        let (result, attempts) = self.apply_with_retry(&action.profile_id, &change).await;
        let receipt = match result {
            Ok(receipt) => receipt,
            Err(e) => {
                self.fail(action, claim, &e.to_string(), attempts).await?;
                return Ok(Disposition::Failed);
            }
        };

        let applied_at = Utc::now();
        let before = before_state(&action.payload, receipt, before_metrics, applied_at);
        let outcome = ActionOutcome::pending(
            &action.id,
            &action.profile_id,
            subject,
            before_metrics,
            applied_at,
            lookback,
        );
        match self
            .queue
            .mark_applied(&action.id, claim, &before, attempts, &outcome, applied_at)
        {
            Ok(()) => {
                tracing::info!(action_id = %action.id, op = change.op(), attempts, "action applied");
                Ok(Disposition::Applied)
            }
            Err(e) => {
                // Stays `applying`, so no worker sends the change again.
                tracing::error!(action_id = %action.id, op = change.op(), error = %e, "action applied on platform but not recorded");
                Ok(Disposition::AppliedUnrecorded(e.to_string()))
            }
        }
    }

    /// Validate the payload, re-check policy and snapshot the before metrics.
    fn prepare(&self, action: &QueuedAction, now: DateTime<Utc>) -> Result<Prepared, DomainError> {
        let change = forward_change(action.action_type, &action.payload)?;

        if action.origin == ActionOrigin::Auto {
            if let Some(rule_type) = action.rule_type {
                let plan = self.plans.get_plan(&action.user_id)?;
                if !EntitlementGate::can_auto_apply(plan, rule_type) {
                    return Ok(Prepared::Denied(EntitlementGate::denial_reason(plan, rule_type)));
                }
            }
        }

        if let Some(entity) = self.guard.first_protected(&action.payload.lineage())? {
            return Ok(Prepared::Denied(format!("protected entity {entity}")));
        }

        let subject = action
            .payload
            .subject(action.action_type)
            .ok_or_else(|| DomainError::Validation(format!("action {} has no measurable entity", action.id)))?;
        let before_metrics = self.metrics.entity_metrics(
            &action.profile_id,
            &subject,
            &ActionOutcome::before_range(now, self.settings.outcome_lookback_days),
        )?;
        Ok(Prepared::Ready {
            change,
            subject,
            before_metrics,
        })
    }

    async fn fail(&self, action: &QueuedAction, claim: &str, error: &str, attempts: u32) -> Result<(), DomainError> {
        tracing::warn!(action_id = %action.id, attempts, error, "action failed");
        self.queue.mark_failed(&action.id, claim, error, attempts, Utc::now())?;
        self.notifier
            .emit(AutomationEvent::ActionFailed {
                action_id: action.id.clone(),
                rule_id: action.rule_id.clone(),
                profile_id: action.profile_id.clone(),
                action_type: action.action_type,
                error: error.to_string(),
            })
            .await;
        Ok(())
    }

    /// One platform call per attempt, each bounded by the API timeout.
    /// Retryable failures back off exponentially; the rest fail at once.
    async fn apply_with_retry(
        &self,
        profile_id: &str,
        change: &ChangeRequest,
    ) -> (Result<ApplyReceipt, PlatformError>, u32) {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let result = match tokio::time::timeout(
                self.settings.api_timeout,
                self.platform.apply(profile_id, change),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(PlatformError::Timeout(self.settings.api_timeout.as_secs())),
            };

            match result {
                Err(e) if e.is_retryable() && attempt < self.settings.max_attempts => {
                    let backoff = self.settings.backoff_base.saturating_mul(2u32.saturating_pow(attempt - 1));
                    tracing::warn!(op = change.op(), attempt, error = %e, backoff_ms = backoff.as_millis() as u64, "retrying platform call");
                    tokio::time::sleep(backoff).await;
                }
                other => return (other, attempt),
            }
        }
    }

    /// Undo an applied action through the same platform path. Anything not
    /// currently applied is left alone.
    pub async fn revert(&self, action_id: &str) -> Result<RevertReport, DomainError> {
        let action = self
            .queue
            .get(action_id)?
            .ok_or_else(|| DomainError::NotFound(format!("action {action_id}")))?;
        if action.status != ActionStatus::Applied {
            tracing::info!(action_id, status = %action.status, "revert skipped, action not applied");
            return Ok(RevertReport {
                action_id: action.id,
                reverted: false,
                status: action.status,
            });
        }

        let before = action.before_state.clone().unwrap_or_default();
        let change = inverse_change(action.action_type, &action.payload, &before)?;
        let (result, attempts) = self.apply_with_retry(&action.profile_id, &change).await;
        result.map_err(|e| {
            DomainError::Platform(format!("revert of {action_id} failed after {attempts} attempt(s): {e}"))
        })?;

        let reverted = self.queue.mark_reverted(action_id, Utc::now())?;
        tracing::info!(action_id, op = change.op(), reverted, "action reverted");
        Ok(RevertReport {
            action_id: action.id,
            reverted,
            status: if reverted { ActionStatus::Reverted } else { action.status },
        })
    }
}

fn before_state(
    payload: &ActionPayload,
    receipt: ApplyReceipt,
    metrics: EntityMetrics,
    now: DateTime<Utc>,
) -> BeforeState {
    BeforeState {
        previous_bid_micros: payload.previous_bid_micros,
        previous_budget_micros: payload.previous_budget_micros,
        previous_percentage: payload.previous_percentage,
        created_entity_id: receipt.created_entity_id,
        metrics,
        captured_at: Some(now),
    }
}

fn field<T: Clone>(value: &Option<T>, name: &str, action_type: ActionType) -> Result<T, DomainError> {
    value
        .clone()
        .ok_or_else(|| DomainError::Validation(format!("{action_type} requires {name}")))
}

/// The platform change that carries out an action.
pub fn forward_change(action_type: ActionType, p: &ActionPayload) -> Result<ChangeRequest, DomainError> {
    p.validate(action_type)?;
    let campaign_id = field(&p.campaign_id, "campaign_id", action_type)?;
    Ok(match action_type {
        ActionType::PauseCampaign => ChangeRequest::PauseCampaign { campaign_id },
        ActionType::CreateKeyword => ChangeRequest::CreateKeyword {
            campaign_id,
            ad_group_id: field(&p.ad_group_id, "ad_group_id", action_type)?,
            keyword_text: field(&p.keyword_text, "keyword_text", action_type)?,
            match_type: field(&p.match_type, "match_type", action_type)?,
            bid_micros: field(&p.bid_micros, "bid_micros", action_type)?,
        },
        ActionType::NegativeKeyword => ChangeRequest::CreateNegativeKeyword {
            campaign_id,
            ad_group_id: p.ad_group_id.clone(),
            keyword_text: field(&p.keyword_text, "keyword_text", action_type)?,
            match_type: field(&p.match_type, "match_type", action_type)?,
        },
        ActionType::SetBid => {
            let bid_micros = field(&p.bid_micros, "bid_micros", action_type)?;
            match (&p.keyword_id, &p.target_id) {
                (Some(keyword_id), _) => ChangeRequest::SetKeywordBid {
                    keyword_id: keyword_id.clone(),
                    bid_micros,
                },
                (None, Some(target_id)) => ChangeRequest::SetTargetBid {
                    target_id: target_id.clone(),
                    bid_micros,
                },
                (None, None) => {
                    return Err(DomainError::Validation(format!(
                        "{action_type} requires keyword_id or target_id"
                    )))
                }
            }
        }
        ActionType::SetPlacementAdjust => ChangeRequest::SetPlacementAdjust {
            campaign_id,
            placement: field(&p.placement, "placement", action_type)?,
            percentage: field(&p.percentage, "percentage", action_type)?,
        },
        ActionType::SetCampaignBudget => ChangeRequest::SetCampaignBudget {
            campaign_id,
            budget_micros: field(&p.budget_micros, "budget_micros", action_type)?,
        },
    })
}

/// The platform change that restores the state recorded before an action.
pub fn inverse_change(
    action_type: ActionType,
    p: &ActionPayload,
    before: &BeforeState,
) -> Result<ChangeRequest, DomainError> {
    let missing = |what: &str| {
        DomainError::Validation(format!("cannot revert {action_type}: no {what} recorded"))
    };
    let campaign_id = p.campaign_id.clone().ok_or_else(|| missing("campaign_id"))?;
    Ok(match action_type {
        ActionType::PauseCampaign => ChangeRequest::EnableCampaign { campaign_id },
        ActionType::CreateKeyword => ChangeRequest::ArchiveKeyword {
            keyword_id: before
                .created_entity_id
                .clone()
                .ok_or_else(|| missing("created keyword id"))?,
        },
        ActionType::NegativeKeyword => ChangeRequest::ArchiveNegativeKeyword {
            campaign_id,
            ad_group_id: p.ad_group_id.clone(),
            negative_keyword_id: before
                .created_entity_id
                .clone()
                .ok_or_else(|| missing("created negative keyword id"))?,
        },
        ActionType::SetBid => {
            let bid_micros = before
                .previous_bid_micros
                .or(p.previous_bid_micros)
                .ok_or_else(|| missing("previous bid"))?;
            match (&p.keyword_id, &p.target_id) {
                (Some(keyword_id), _) => ChangeRequest::SetKeywordBid {
                    keyword_id: keyword_id.clone(),
                    bid_micros,
                },
                (None, Some(target_id)) => ChangeRequest::SetTargetBid {
                    target_id: target_id.clone(),
                    bid_micros,
                },
                (None, None) => return Err(missing("keyword_id or target_id")),
            }
        }
        ActionType::SetPlacementAdjust => ChangeRequest::SetPlacementAdjust {
            campaign_id,
            placement: p.placement.ok_or_else(|| missing("placement"))?,
            percentage: before
                .previous_percentage
                .or(p.previous_percentage)
                .ok_or_else(|| missing("previous percentage"))?,
        },
        ActionType::SetCampaignBudget => ChangeRequest::SetCampaignBudget {
            campaign_id,
            budget_micros: before
                .previous_budget_micros
                .or(p.previous_budget_micros)
                .ok_or_else(|| missing("previous budget"))?,
        },
    })
}
