pub mod application;
pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

use crate::application::actions::{ActionsUseCase, ManualAction};
use crate::application::alerts::{AlertsUseCase, ApprovalReport};
use crate::application::collect_outcomes::{CollectOutcomesUseCase, CollectionSummary};
use crate::application::evaluate_rules::{EvaluateRulesUseCase, EvaluationSummary};
use crate::application::evaluator::RuleEvaluator;
use crate::application::execute_actions::{ExecuteActionsUseCase, ExecutionSummary, ExecutorSettings, RevertReport};
use crate::application::notifier::Notifier;
use crate::application::outcome_scoring::OutcomeScorer;
use crate::application::protection::ProtectedEntityGuard;
use crate::application::rules::{NewRule, RulesUseCase};
use crate::config::AutomationConfig;
use crate::domain::entities::action_outcome::ActionOutcome;
use crate::domain::entities::alert::Alert;
use crate::domain::entities::automation_rule::AutomationRule;
use crate::domain::entities::protected_entity::ProtectedEntity;
use crate::domain::entities::queued_action::QueuedAction;
use crate::domain::entities::rule_run::RuleRun;
use crate::domain::error::DomainError;
use crate::domain::ports::action_queue::{ActionFilter, ActionQueue};
use crate::domain::ports::ads_platform::AdsPlatform;
use crate::domain::ports::alert_repository::{AlertFilter, AlertRepository};
use crate::domain::ports::event_sink::EventSink;
use crate::domain::ports::metrics_source::MetricsSource;
use crate::domain::ports::outcome_repository::OutcomeRepository;
use crate::domain::ports::plan_source::PlanSource;
use crate::domain::ports::protected_entity_repository::ProtectedEntityRepository;
use crate::domain::ports::rule_repository::{RuleFilter, RuleRepository};
use crate::domain::ports::run_repository::RunRepository;
use crate::domain::values::entity_type::EntityRef;
use crate::domain::values::plan_tier::PlanTier;
use crate::infrastructure::ads::http::HttpAdsPlatform;
use crate::infrastructure::ads::simulated::SimulatedAdsPlatform;
use crate::infrastructure::events::log::LogEventSink;
use crate::infrastructure::events::webhook::WebhookEventSink;
use crate::infrastructure::sqlite::action_queue::SqliteActionQueue;
use crate::infrastructure::sqlite::alert_repo::SqliteAlertRepo;
use crate::infrastructure::sqlite::metrics_store::{ImportCounts, MetricsImport, SqliteMetricsStore};
use crate::infrastructure::sqlite::migrations::run_migrations;
use crate::infrastructure::sqlite::outcome_repo::SqliteOutcomeRepo;
use crate::infrastructure::sqlite::plan_repo::SqlitePlanStore;
use crate::infrastructure::sqlite::protected_repo::SqliteProtectedRepo;
use crate::infrastructure::sqlite::rule_repo::SqliteRuleRepo;
use crate::infrastructure::sqlite::run_repo::SqliteRunRepo;
use crate::infrastructure::sqlite::{open_connection, shared};
use chrono::{DateTime, Utc};
use std::sync::Arc;

pub struct AdPilot {
    config: AutomationConfig,
    metrics_store: Arc<SqliteMetricsStore>,
    plan_store: Arc<SqlitePlanStore>,
    protected_repo: Arc<dyn ProtectedEntityRepository>,
    run_repo: Arc<dyn RunRepository>,
    outcome_repo: Arc<dyn OutcomeRepository>,
    rules_uc: RulesUseCase,
    alerts_uc: AlertsUseCase,
    actions_uc: ActionsUseCase,
    evaluate_uc: EvaluateRulesUseCase,
    execute_uc: ExecuteActionsUseCase,
    collect_uc: CollectOutcomesUseCase,
}

impl AdPilot {
    /// Wire the live platform client when credentials exist and simulation is
    /// off; otherwise changes go to the simulated platform.
    pub fn new(config: AutomationConfig) -> Result<Self, DomainError> {
        let platform: Arc<dyn AdsPlatform> = match (&config.ads.access_token, config.ads.simulate) {
            (Some(token), false) if !token.is_empty() => Arc::new(HttpAdsPlatform::new(
                config.ads.base_url.clone(),
                config.ads.client_id.clone(),
                token.clone(),
                config.api_timeout_secs,
            )),
            _ => Arc::new(SimulatedAdsPlatform::new()),
        };
        tracing::debug!(platform = platform.name(), "ads platform selected");

        let mut sinks: Vec<Arc<dyn EventSink>> = vec![Arc::new(LogEventSink)];
        if let Some(url) = &config.webhook_url {
            sinks.push(Arc::new(WebhookEventSink::new(url.clone(), config.api_timeout_secs)));
        }

        Self::with_providers(config, platform, sinks)
    }

    pub fn with_providers(
        config: AutomationConfig,
        platform: Arc<dyn AdsPlatform>,
        sinks: Vec<Arc<dyn EventSink>>,
    ) -> Result<Self, DomainError> {
        let conn = open_connection(&config.database_path)?;
        run_migrations(&conn)?;
        let conn = shared(conn);

        let rule_repo: Arc<dyn RuleRepository> = Arc::new(SqliteRuleRepo::new(conn.clone()));
        let run_repo: Arc<dyn RunRepository> = Arc::new(SqliteRunRepo::new(conn.clone()));
        let alert_repo: Arc<dyn AlertRepository> = Arc::new(SqliteAlertRepo::new(conn.clone()));
        let queue: Arc<dyn ActionQueue> =
            Arc::new(SqliteActionQueue::with_claim_lease(conn.clone(), config.claim_lease_secs));
        let outcome_repo: Arc<dyn OutcomeRepository> = Arc::new(SqliteOutcomeRepo::new(conn.clone()));
        let protected_repo: Arc<dyn ProtectedEntityRepository> =
            Arc::new(SqliteProtectedRepo::new(conn.clone()));
        let plan_store = Arc::new(SqlitePlanStore::new(conn.clone()));
        let metrics_store = Arc::new(SqliteMetricsStore::new(conn));

        let plans: Arc<dyn PlanSource> = plan_store.clone();
        let metrics: Arc<dyn MetricsSource> = metrics_store.clone();
        let guard = Arc::new(ProtectedEntityGuard::new(protected_repo.clone()));
        let notifier = Notifier::new(sinks);

        Ok(Self {
            rules_uc: RulesUseCase::new(rule_repo.clone()),
            alerts_uc: AlertsUseCase::new(alert_repo.clone(), rule_repo.clone(), queue.clone(), guard.clone()),
            actions_uc: ActionsUseCase::new(queue.clone()),
            evaluate_uc: EvaluateRulesUseCase::new(
                rule_repo,
                run_repo.clone(),
                alert_repo,
                queue.clone(),
                plans.clone(),
                RuleEvaluator::new(metrics.clone(), guard.clone()),
                notifier.clone(),
                config.auto_disable_after,
            ),
            execute_uc: ExecuteActionsUseCase::new(
                queue.clone(),
                metrics.clone(),
                plans,
                guard,
                platform,
                notifier,
                ExecutorSettings::from_config(&config),
            ),
            collect_uc: CollectOutcomesUseCase::new(outcome_repo.clone(), queue, metrics, OutcomeScorer::default()),
            config,
            metrics_store,
            plan_store,
            protected_repo,
            run_repo,
            outcome_repo,
        })
    }

    pub fn config(&self) -> &AutomationConfig {
        &self.config
    }

    /// Ingestion side of the metrics store.
    pub fn metrics_store(&self) -> &SqliteMetricsStore {
        &self.metrics_store
    }

    pub fn import_metrics(&self, doc: &MetricsImport) -> Result<ImportCounts, DomainError> {
        self.metrics_store.import(doc)
    }

    // Rules
    pub fn rule_add(&self, rule: NewRule) -> Result<AutomationRule, DomainError> {
        self.rules_uc.create(rule.into_rule())
    }

    pub fn rule_update(&self, rule: AutomationRule) -> Result<AutomationRule, DomainError> {
        self.rules_uc.update(rule)
    }

    pub fn rule_get(&self, id: &str) -> Result<AutomationRule, DomainError> {
        self.rules_uc.get(id)
    }

    pub fn rules(&self, profile_id: Option<String>, enabled: Option<bool>) -> Result<Vec<AutomationRule>, DomainError> {
        self.rules_uc.list(&RuleFilter { profile_id, enabled })
    }

    pub fn rule_enable(&self, id: &str) -> Result<AutomationRule, DomainError> {
        self.rules_uc.enable(id)
    }

    pub fn rule_disable(&self, id: &str, reason: Option<&str>) -> Result<AutomationRule, DomainError> {
        self.rules_uc.disable(id, reason)
    }

    pub fn runs(&self, rule_id: Option<&str>, limit: usize) -> Result<Vec<RuleRun>, DomainError> {
        self.run_repo.list(rule_id, limit)
    }

    // Jobs
    pub async fn evaluate(&self, now: DateTime<Utc>) -> Result<EvaluationSummary, DomainError> {
        self.evaluate_uc.run_all(now).await
    }

    pub async fn evaluate_rule(&self, rule_id: &str, now: DateTime<Utc>) -> Result<RuleRun, DomainError> {
        self.evaluate_uc.run_one(rule_id, now).await
    }

    pub async fn execute(&self, batch_size: Option<usize>) -> Result<ExecutionSummary, DomainError> {
        self.execute_uc.process_batch(batch_size).await
    }

    pub fn collect(&self, now: DateTime<Utc>, limit: usize) -> Result<CollectionSummary, DomainError> {
        self.collect_uc.collect_due(now, limit)
    }

    pub async fn revert(&self, action_id: &str) -> Result<RevertReport, DomainError> {
        self.execute_uc.revert(action_id).await
    }

    // Actions
    pub fn enqueue(&self, action: ManualAction) -> Result<QueuedAction, DomainError> {
        self.actions_uc.enqueue_manual(action)
    }

    pub fn action_get(&self, id: &str) -> Result<QueuedAction, DomainError> {
        self.actions_uc.get(id)
    }

    pub fn actions(&self, filter: &ActionFilter) -> Result<Vec<QueuedAction>, DomainError> {
        self.actions_uc.list(filter)
    }

    pub fn outcomes(&self, limit: usize) -> Result<Vec<ActionOutcome>, DomainError> {
        self.outcome_repo.list(limit)
    }

    pub fn outcome_for_action(&self, action_id: &str) -> Result<Option<ActionOutcome>, DomainError> {
        self.outcome_repo.get_by_action(action_id)
    }

    // Alerts
    pub fn alerts(&self, filter: &AlertFilter) -> Result<Vec<Alert>, DomainError> {
        self.alerts_uc.list(filter)
    }

    pub fn alert_ack(&self, id: &str) -> Result<Alert, DomainError> {
        self.alerts_uc.acknowledge(id)
    }

    pub fn alert_mute(&self, id: &str) -> Result<Alert, DomainError> {
        self.alerts_uc.mute(id)
    }

    pub fn approve(&self, alert_id: &str) -> Result<ApprovalReport, DomainError> {
        self.alerts_uc.approve(alert_id)
    }

    // Protections and plans
    pub fn protect(&self, entity: EntityRef, reason: Option<String>) -> Result<ProtectedEntity, DomainError> {
        let protected = ProtectedEntity::new(entity, reason);
        self.protected_repo.add(&protected)?;
        Ok(protected)
    }

    pub fn unprotect(&self, entity: &EntityRef) -> Result<bool, DomainError> {
        self.protected_repo.remove(entity)
    }

    pub fn protected(&self) -> Result<Vec<ProtectedEntity>, DomainError> {
        self.protected_repo.list()
    }

    pub fn plan_set(&self, user_id: &str, plan: PlanTier) -> Result<(), DomainError> {
        self.plan_store.set_plan(user_id, plan)
    }

    pub fn plan_get(&self, user_id: &str) -> Result<PlanTier, DomainError> {
        self.plan_store.get_plan(user_id)
    }
}
