use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::application::entitlement::EntitlementGate;
use crate::application::evaluator::{Evaluation, RuleEvaluator};
use crate::application::notifier::Notifier;
use crate::application::throttle::ThrottleGovernor;
use crate::domain::entities::automation_rule::AutomationRule;
use crate::domain::entities::queued_action::{ProposedAction, QueuedAction};
use crate::domain::entities::rule_run::{RuleRun, RunCounts};
use crate::domain::error::DomainError;
use crate::domain::ports::action_queue::ActionQueue;
use crate::domain::ports::alert_repository::AlertRepository;
use crate::domain::ports::event_sink::AutomationEvent;
use crate::domain::ports::plan_source::PlanSource;
use crate::domain::ports::rule_repository::{RuleFilter, RuleRepository};
use crate::domain::ports::run_repository::RunRepository;
use crate::domain::values::action_status::{ActionOrigin, ActionStatus};
use crate::domain::values::run_status::RunStatus;
use crate::domain::values::time_range::TimeRange;

pub struct EvaluateRulesUseCase {
    rule_repo: Arc<dyn RuleRepository>,
    run_repo: Arc<dyn RunRepository>,
    alert_repo: Arc<dyn AlertRepository>,
    queue: Arc<dyn ActionQueue>,
    plans: Arc<dyn PlanSource>,
    evaluator: RuleEvaluator,
    throttle: ThrottleGovernor,
    notifier: Notifier,
    auto_disable_after: usize,
}

#[derive(Debug, Default, Serialize)]
pub struct EvaluationSummary {
    pub rules: usize,
    pub succeeded: usize,
    pub errored: usize,
    pub alerts_created: usize,
    pub actions_enqueued: usize,
    pub actions_skipped: usize,
    pub auto_disabled: Vec<String>,
    /// Per-rule failures outside the rule runs themselves.
    pub errors: Vec<String>,
    pub runs: Vec<RuleRun>,
}

impl EvaluateRulesUseCase {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        rule_repo: Arc<dyn RuleRepository>,
        run_repo: Arc<dyn RunRepository>,
        alert_repo: Arc<dyn AlertRepository>,
        queue: Arc<dyn ActionQueue>,
        plans: Arc<dyn PlanSource>,
        evaluator: RuleEvaluator,
        notifier: Notifier,
        auto_disable_after: usize,
    ) -> Self {
        Self {
            throttle: ThrottleGovernor::new(queue.clone()),
            rule_repo,
            run_repo,
            alert_repo,
            queue,
            plans,
            evaluator,
            notifier,
            auto_disable_after,
        }
    }

    /// Evaluate every enabled rule. One rule's failure never stops the others.
    pub async fn run_all(&self, now: DateTime<Utc>) -> Result<EvaluationSummary, DomainError> {
        let rules = self.rule_repo.list(&RuleFilter {
            profile_id: None,
            enabled: Some(true),
        })?;

        let mut summary = EvaluationSummary {
            rules: rules.len(),
            ..Default::default()
        };
        for rule in &rules {
            match self.run_rule(rule, now).await {
                Ok(run) => {
                    if run.status == RunStatus::Success {
                        summary.succeeded += 1;
                    } else {
                        summary.errored += 1;
                        match self.disable_if_failing(rule).await {
                            Ok(true) => summary.auto_disabled.push(rule.id.clone()),
                            Ok(false) => {}
                            Err(e) => {
                                tracing::error!(rule_id = %rule.id, error = %e, "auto-disable check failed");
                                summary.errors.push(format!("{}: {e}", rule.id));
                            }
                        }
                    }
                    summary.alerts_created += run.alerts_created;
                    summary.actions_enqueued += run.actions_enqueued;
                    summary.actions_skipped += run.actions_skipped;
                    summary.runs.push(run);
                }
                Err(e) => {
                    // The run record itself could not be written.
                    tracing::error!(rule_id = %rule.id, error = %e, "rule run not recorded");
                    summary.errored += 1;
                    summary.errors.push(format!("{}: {e}", rule.id));
                }
            }
        }

        tracing::info!(
            rules = summary.rules,
            succeeded = summary.succeeded,
            errored = summary.errored,
            alerts = summary.alerts_created,
            enqueued = summary.actions_enqueued,
            skipped = summary.actions_skipped,
            "evaluation pass complete"
        );
        Ok(summary)
    }

    /// Evaluate one rule on demand, enabled or not.
    pub async fn run_one(&self, rule_id: &str, now: DateTime<Utc>) -> Result<RuleRun, DomainError> {
        let rule = self
            .rule_repo
            .get(rule_id)?
            .ok_or_else(|| DomainError::NotFound(format!("rule {rule_id}")))?;
        let run = self.run_rule(&rule, now).await?;
        if run.status == RunStatus::Error && rule.enabled {
            self.disable_if_failing(&rule).await?;
        }
        Ok(run)
    }

    /// Exactly one run record per call. Work persisted before a failure stays
    /// persisted and is counted on the errored run.
    async fn run_rule(&self, rule: &AutomationRule, now: DateTime<Utc>) -> Result<RuleRun, DomainError> {
        let mut run = RuleRun::start(&rule.id, now);
        self.run_repo.insert(&run)?;

        let mut counts = RunCounts::default();
        let error = match self.evaluate_and_persist(rule, now, &mut counts) {
            Ok(()) => None,
            Err(e) => {
                tracing::warn!(rule_id = %rule.id, error = %e, "rule evaluation failed");
                Some(e.to_string())
            }
        };
        run.finish(counts, error, Utc::now().max(now));
        self.run_repo.finish(&run)?;

        tracing::debug!(
            rule_id = %rule.id,
            run_id = %run.id,
            status = %run.status,
            evaluated = run.evaluated,
            alerts = run.alerts_created,
            enqueued = run.actions_enqueued,
            "rule run finished"
        );
        self.notifier
            .emit(AutomationEvent::RuleRunCompleted {
                rule_id: rule.id.clone(),
                run_id: run.id.clone(),
                profile_id: rule.profile_id.clone(),
                status: run.status,
                alerts_created: run.alerts_created,
                actions_enqueued: run.actions_enqueued,
                error: run.error.clone(),
            })
            .await;
        Ok(run)
    }

    fn evaluate_and_persist(
        &self,
        rule: &AutomationRule,
        now: DateTime<Utc>,
        counts: &mut RunCounts,
    ) -> Result<(), DomainError> {
        rule.params.validate()?;
        let window = TimeRange::lookback(now, rule.params.lookback_days());
        let Evaluation {
            alerts,
            proposed,
            evaluated,
            matched_entities,
        } = self.evaluator.evaluate(rule, window)?;
        counts.evaluated = evaluated;

        for alert in &alerts {
            if self.alert_repo.insert_if_absent(alert)? {
                counts.alerts_created += 1;
            }
        }

        if !proposed.is_empty() {
            self.admit_all(rule, proposed, now, counts)?;
        }

        let resolved = self.alert_repo.resolve_cleared(&rule.id, &matched_entities, now)?;
        if resolved > 0 {
            tracing::info!(rule_id = %rule.id, resolved, "alerts resolved, condition cleared");
        }
        Ok(())
    }

    /// Gate each proposal by plan and throttle, then enqueue it as queued or
    /// record the denial. A denial does not claim the proposal's key, so a
    /// later run in the same window may still admit it.
    fn admit_all(
        &self,
        rule: &AutomationRule,
        proposed: Vec<ProposedAction>,
        now: DateTime<Utc>,
        counts: &mut RunCounts,
    ) -> Result<(), DomainError> {
        let rule_type = rule.rule_type();
        let plan = self.plans.get_plan(&rule.user_id)?;
        let entitled = EntitlementGate::can_auto_apply(plan, rule_type);

        for p in proposed {
            if self.queue.get_by_key(&p.idempotency_key)?.is_some() {
                tracing::debug!(rule_id = %rule.id, key = %p.idempotency_key, "action already queued for this window");
                continue;
            }
            let mut action = QueuedAction::new(
                Some(rule.id.clone()),
                Some(rule_type),
                ActionOrigin::Auto,
                rule.profile_id.clone(),
                rule.user_id.clone(),
                p.action_type,
                p.payload,
                p.idempotency_key,
                now,
            );
            if !entitled {
                action = action.into_skipped(EntitlementGate::denial_reason(plan, rule_type));
            } else {
                let admission = self.throttle.admit(rule, now)?;
                if !admission.allowed {
                    action = action.into_skipped(admission.reason.unwrap_or_default());
                }
            }

            if !self.queue.enqueue(&action)? {
                tracing::debug!(rule_id = %rule.id, key = %action.idempotency_key, "already recorded for this window");
                continue;
            }
            match action.status {
                ActionStatus::Queued => counts.actions_enqueued += 1,
                _ => {
                    tracing::warn!(
                        rule_id = %rule.id,
                        action_type = %action.action_type,
                        reason = action.error.as_deref().unwrap_or_default(),
                        "action skipped by policy"
                    );
                    counts.actions_skipped += 1;
                }
            }
        }
        Ok(())
    }

    /// Switch a rule off once its last `auto_disable_after` runs all errored.
    async fn disable_if_failing(&self, rule: &AutomationRule) -> Result<bool, DomainError> {
        let n = self.auto_disable_after;
        let recent = self.run_repo.recent_statuses(&rule.id, n)?;
        if recent.len() < n || recent.iter().any(|s| *s != RunStatus::Error) {
            return Ok(false);
        }

        let reason = format!("auto-disabled after {n} consecutive failed runs");
        self.rule_repo.set_enabled(&rule.id, false, Some(&reason))?;
        tracing::warn!(rule_id = %rule.id, failures = n, "rule auto-disabled");
        self.notifier
            .emit(AutomationEvent::RuleAutoDisabled {
                rule_id: rule.id.clone(),
                profile_id: rule.profile_id.clone(),
                consecutive_failures: n,
            })
            .await;
        Ok(true)
    }
}
