mod common;

use adpilot::application::evaluate_rules::EvaluateRulesUseCase;
use adpilot::application::evaluator::RuleEvaluator;
use adpilot::application::notifier::Notifier;
use adpilot::application::protection::ProtectedEntityGuard;
use adpilot::domain::error::DomainError;
use adpilot::domain::ports::action_queue::ActionFilter;
use adpilot::domain::ports::alert_repository::AlertFilter;
use adpilot::domain::ports::event_sink::{AutomationEvent, EventSink};
use adpilot::domain::ports::metrics_source::*;
use adpilot::domain::entities::automation_rule::AutomationRule;
use adpilot::domain::ports::rule_repository::{RuleFilter, RuleRepository};
use adpilot::domain::ports::run_repository::RunRepository;
use adpilot::domain::values::action_status::{ActionOrigin, ActionStatus};
use adpilot::domain::values::action_type::ActionType;
use adpilot::domain::values::alert_state::AlertState;
use adpilot::domain::values::entity_type::EntityRef;
use adpilot::domain::values::metrics::EntityMetrics;
use adpilot::domain::values::plan_tier::PlanTier;
use adpilot::domain::values::run_status::RunStatus;
use adpilot::domain::values::time_range::DateRange;
use adpilot::infrastructure::sqlite::action_queue::SqliteActionQueue;
use adpilot::infrastructure::sqlite::alert_repo::SqliteAlertRepo;
use adpilot::infrastructure::sqlite::metrics_store::SearchTermDayRecord;
use adpilot::infrastructure::sqlite::migrations::run_migrations;
use adpilot::infrastructure::sqlite::plan_repo::SqlitePlanStore;
use adpilot::infrastructure::sqlite::protected_repo::SqliteProtectedRepo;
use adpilot::infrastructure::sqlite::rule_repo::SqliteRuleRepo;
use adpilot::infrastructure::sqlite::run_repo::SqliteRunRepo;
use adpilot::infrastructure::sqlite::{open_connection, shared};
use async_trait::async_trait;
use chrono::{Duration, NaiveDate};
use common::*;
use std::sync::{Arc, Mutex};

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
}

#[tokio::test]
async fn test_budget_depletion_enqueues_budget_raise_once() {
    let (pilot, _) = setup();
    set_plan(&pilot, PlanTier::Agency);
    add_rule(&pilot, budget_rule("auto"));
    seed_campaign(&pilot, "c1", 100.0);
    seed_campaign_day(&pilot, "c1", day(10), spend(85.0));

    // 09:36 UTC is 40% of the day.
    let now = at(2026, 3, 10, 9, 36);
    let summary = pilot.evaluate(now).await.unwrap();
    assert_eq!(summary.rules, 1);
    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.alerts_created, 1);
    assert_eq!(summary.actions_enqueued, 1);

    let actions = pilot.actions(&ActionFilter::default()).unwrap();
    assert_eq!(actions.len(), 1);
    let action = &actions[0];
    assert_eq!(action.action_type, ActionType::SetCampaignBudget);
    assert_eq!(action.status, ActionStatus::Queued);
    assert_eq!(action.origin, ActionOrigin::Auto);
    assert_eq!(action.payload.budget_micros, Some(120_000_000));
    assert_eq!(action.payload.previous_budget_micros, Some(100_000_000));

    // Same trigger day: nothing new.
    let again = pilot.evaluate(now + Duration::minutes(15)).await.unwrap();
    assert_eq!(again.alerts_created, 0);
    assert_eq!(again.actions_enqueued, 0);
    assert_eq!(pilot.actions(&ActionFilter::default()).unwrap().len(), 1);
    assert_eq!(pilot.alerts(&AlertFilter::default()).unwrap().len(), 1);

    let runs = pilot.runs(None, 10).unwrap();
    assert_eq!(runs.len(), 2);
    assert!(runs.iter().all(|r| r.status == RunStatus::Success));
}

#[tokio::test]
async fn test_dry_run_never_queues() {
    let (pilot, _) = setup();
    set_plan(&pilot, PlanTier::Agency);
    add_rule(&pilot, budget_rule("dry_run"));
    seed_campaign(&pilot, "c1", 100.0);
    seed_campaign_day(&pilot, "c1", day(10), spend(85.0));

    let summary = pilot.evaluate(at(2026, 3, 10, 9, 36)).await.unwrap();
    assert_eq!(summary.alerts_created, 1);
    assert_eq!(summary.actions_enqueued + summary.actions_skipped, 0);
    assert!(pilot.actions(&ActionFilter::default()).unwrap().is_empty());

    let alerts = pilot.alerts(&AlertFilter::default()).unwrap();
    assert!(alerts[0].proposed_actions.is_empty());
}

#[tokio::test]
async fn test_free_plan_records_skipped_action() {
    let (pilot, _) = setup();
    set_plan(&pilot, PlanTier::Free);
    add_rule(&pilot, budget_rule("auto"));
    seed_campaign(&pilot, "c1", 100.0);
    seed_campaign_day(&pilot, "c1", day(10), spend(85.0));

    let summary = pilot.evaluate(at(2026, 3, 10, 9, 36)).await.unwrap();
    assert_eq!(summary.actions_enqueued, 0);
    assert_eq!(summary.actions_skipped, 1);

    let actions = pilot.actions(&ActionFilter::default()).unwrap();
    assert_eq!(actions[0].status, ActionStatus::Skipped);
    assert!(actions[0].error.as_deref().unwrap().contains("entitlement"));
}

#[tokio::test]
async fn test_pro_plan_cannot_auto_raise_budgets() {
    let (pilot, _) = setup();
    set_plan(&pilot, PlanTier::Pro);
    add_rule(&pilot, budget_rule("auto"));
    seed_campaign(&pilot, "c1", 100.0);
    seed_campaign_day(&pilot, "c1", day(10), spend(85.0));

    let summary = pilot.evaluate(at(2026, 3, 10, 9, 36)).await.unwrap();
    assert_eq!(summary.actions_skipped, 1);
}

#[tokio::test]
async fn test_prune_on_protected_campaign_alerts_without_action() {
    let (pilot, _) = setup();
    set_plan(&pilot, PlanTier::Pro);
    add_rule(&pilot, prune_rule("auto"));
    seed_wasted_term(&pilot, "c1", "ag1", "free widget manual", day(9));
    pilot.protect(EntityRef::campaign("c1"), Some("brand campaign".into())).unwrap();

    let summary = pilot.evaluate(at(2026, 3, 10, 12, 0)).await.unwrap();
    assert_eq!(summary.alerts_created, 1);
    assert_eq!(summary.actions_enqueued, 0);
    assert!(pilot.actions(&ActionFilter::default()).unwrap().is_empty());

    let alert = &pilot.alerts(&AlertFilter::default()).unwrap()[0];
    assert!(alert.protected);
    assert!(alert.message.contains("[protected: campaign:c1]"));
    assert_eq!(alert.proposed_actions.len(), 1);
}

#[tokio::test]
async fn test_prune_proposes_one_negative_keyword() {
    let (pilot, _) = setup();
    set_plan(&pilot, PlanTier::Pro);
    add_rule(&pilot, prune_rule("auto"));
    seed_wasted_term(&pilot, "c1", "ag1", "free widget manual", day(9));

    let summary = pilot.evaluate(at(2026, 3, 10, 12, 0)).await.unwrap();
    assert_eq!(summary.actions_enqueued, 1);

    let action = &pilot.actions(&ActionFilter::default()).unwrap()[0];
    assert_eq!(action.action_type, ActionType::NegativeKeyword);
    assert_eq!(action.payload.keyword_text.as_deref(), Some("free widget manual"));
    assert_eq!(action.payload.ad_group_id.as_deref(), Some("ag1"));
}

#[tokio::test]
async fn test_spend_spike_flags_only_the_outlier() {
    let (pilot, _) = setup();
    add_rule(
        &pilot,
        serde_json::json!({
            "rule_type": "spend_spike",
            "params": {"lookbackDays": 7, "stdevMultiplier": 2, "minSpend": 5},
        }),
    );
    // Mean 50, sample stdev 10, threshold 70.
    let history = [40.0, 60.0, 40.0, 60.0, 40.0, 60.0, 50.0];
    for (campaign, today_spend) in [("c1", 75.0), ("c2", 65.0)] {
        seed_campaign(&pilot, campaign, 500.0);
        for (i, s) in history.iter().enumerate() {
            seed_campaign_day(&pilot, campaign, day(3 + i as u32), spend(*s));
        }
        seed_campaign_day(&pilot, campaign, day(10), spend(today_spend));
    }

    let summary = pilot.evaluate(at(2026, 3, 10, 15, 0)).await.unwrap();
    assert_eq!(summary.alerts_created, 1);
    let alert = &pilot.alerts(&AlertFilter::default()).unwrap()[0];
    assert_eq!(alert.entity, EntityRef::campaign("c1"));
}

#[tokio::test]
async fn test_cleared_condition_resolves_alert() {
    let (pilot, _) = setup();
    add_rule(&pilot, prune_rule("dry_run"));
    seed_wasted_term(&pilot, "c1", "ag1", "free widget manual", day(9));

    pilot.evaluate(at(2026, 3, 10, 12, 0)).await.unwrap();
    let open = pilot
        .alerts(&AlertFilter {
            state: Some(AlertState::New),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(open.len(), 1);

    // The term converts, so it no longer qualifies for pruning.
    pilot
        .metrics_store()
        .record_search_term_day(
            PROFILE,
            &SearchTermDayRecord {
                campaign_id: "c1".into(),
                ad_group_id: "ag1".into(),
                search_term: "free widget manual".into(),
                date: day(10),
                metrics: EntityMetrics {
                    orders: 1,
                    sales: 30.0,
                    ..Default::default()
                },
            },
        )
        .unwrap();
    pilot.evaluate(at(2026, 3, 11, 12, 0)).await.unwrap();

    let alert = &pilot.alerts(&AlertFilter::default()).unwrap()[0];
    assert_eq!(alert.state, AlertState::Resolved);
}

#[tokio::test]
async fn test_evaluate_unknown_rule_is_not_found() {
    let (pilot, _) = setup();
    let err = pilot.evaluate_rule("missing", at(2026, 3, 10, 12, 0)).await.unwrap_err();
    assert!(matches!(err, DomainError::NotFound(_)));
}

/// Metrics source that is always down.
struct OfflineMetrics;

impl MetricsSource for OfflineMetrics {
    fn entity_metrics(&self, _: &str, _: &EntityRef, _: &DateRange) -> Result<EntityMetrics, DomainError> {
        Err(DomainError::Database("metrics offline".into()))
    }
    fn campaigns(&self, _: &str, _: NaiveDate) -> Result<Vec<CampaignSnapshot>, DomainError> {
        Err(DomainError::Database("metrics offline".into()))
    }
    fn daily_spend(&self, _: &str, _: &str, _: &DateRange) -> Result<Vec<DailySpend>, DomainError> {
        Err(DomainError::Database("metrics offline".into()))
    }
    fn search_terms(&self, _: &str, _: &DateRange) -> Result<Vec<SearchTermStats>, DomainError> {
        Err(DomainError::Database("metrics offline".into()))
    }
    fn targets(&self, _: &str, _: &DateRange) -> Result<Vec<TargetStats>, DomainError> {
        Err(DomainError::Database("metrics offline".into()))
    }
    fn placements(&self, _: &str, _: &DateRange) -> Result<Vec<PlacementStats>, DomainError> {
        Err(DomainError::Database("metrics offline".into()))
    }
}

#[derive(Default)]
struct CollectingSink {
    events: Mutex<Vec<AutomationEvent>>,
}

#[async_trait]
impl EventSink for CollectingSink {
    fn name(&self) -> &str {
        "collecting"
    }

    async fn emit(&self, event: &AutomationEvent) -> Result<(), DomainError> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

#[tokio::test]
async fn test_rule_auto_disabled_after_consecutive_failures() {
    let conn = open_connection(":memory:").unwrap();
    run_migrations(&conn).unwrap();
    let conn = shared(conn);

    let rules = Arc::new(SqliteRuleRepo::new(conn.clone()));
    let runs = Arc::new(SqliteRunRepo::new(conn.clone()));
    let queue = Arc::new(SqliteActionQueue::new(conn.clone()));
    let guard = Arc::new(ProtectedEntityGuard::new(Arc::new(SqliteProtectedRepo::new(conn.clone()))));
    let sink = Arc::new(CollectingSink::default());
    let sinks: Vec<Arc<dyn EventSink>> = vec![sink.clone()];
    let use_case = EvaluateRulesUseCase::new(
        rules.clone(),
        runs.clone(),
        Arc::new(SqliteAlertRepo::new(conn.clone())),
        queue,
        Arc::new(SqlitePlanStore::new(conn)),
        RuleEvaluator::new(Arc::new(OfflineMetrics), guard),
        Notifier::new(sinks),
        3,
    );

    let rule = rule_from_json(budget_rule("auto")).into_rule();
    rules.add(&rule).unwrap();
    let now = at(2026, 3, 10, 9, 0);

    for i in 0..2 {
        let summary = use_case.run_all(now + Duration::hours(i)).await.unwrap();
        assert_eq!(summary.errored, 1);
        assert!(summary.auto_disabled.is_empty());
    }
    let summary = use_case.run_all(now + Duration::hours(2)).await.unwrap();
    assert_eq!(summary.auto_disabled, vec![rule.id.clone()]);

    let stored = rules.get(&rule.id).unwrap().unwrap();
    assert!(!stored.enabled);
    assert_eq!(
        stored.disabled_reason.as_deref(),
        Some("auto-disabled after 3 consecutive failed runs")
    );

    let recorded = runs.list(Some(&rule.id), 10).unwrap();
    assert_eq!(recorded.len(), 3);
    assert!(recorded
        .iter()
        .all(|r| r.status == RunStatus::Error && r.error.as_deref().unwrap().contains("metrics offline")));

    let events = sink.events.lock().unwrap();
    assert!(events
        .iter()
        .any(|e| matches!(e, AutomationEvent::RuleAutoDisabled { consecutive_failures: 3, .. })));

    // Disabled rules drop out of the next pass.
    drop(events);
    assert_eq!(use_case.run_all(now + Duration::hours(3)).await.unwrap().rules, 0);
}

/// Rule store whose enable toggle always fails.
struct LockedRules(SqliteRuleRepo);

impl RuleRepository for LockedRules {
    fn add(&self, rule: &AutomationRule) -> Result<(), DomainError> {
        self.0.add(rule)
    }
    fn update(&self, rule: &AutomationRule) -> Result<(), DomainError> {
        self.0.update(rule)
    }
    fn get(&self, id: &str) -> Result<Option<AutomationRule>, DomainError> {
        self.0.get(id)
    }
    fn list(&self, filter: &RuleFilter) -> Result<Vec<AutomationRule>, DomainError> {
        self.0.list(filter)
    }
    fn set_enabled(&self, _: &str, _: bool, _: Option<&str>) -> Result<(), DomainError> {
        Err(DomainError::Database("database is locked".into()))
    }
}

#[tokio::test]
async fn test_failed_auto_disable_does_not_stop_other_rules() {
    let conn = open_connection(":memory:").unwrap();
    run_migrations(&conn).unwrap();
    let conn = shared(conn);

    let rules = Arc::new(LockedRules(SqliteRuleRepo::new(conn.clone())));
    let runs = Arc::new(SqliteRunRepo::new(conn.clone()));
    let guard = Arc::new(ProtectedEntityGuard::new(Arc::new(SqliteProtectedRepo::new(conn.clone()))));
    let use_case = EvaluateRulesUseCase::new(
        rules.clone(),
        runs.clone(),
        Arc::new(SqliteAlertRepo::new(conn.clone())),
        Arc::new(SqliteActionQueue::new(conn.clone())),
        Arc::new(SqlitePlanStore::new(conn)),
        RuleEvaluator::new(Arc::new(OfflineMetrics), guard),
        Notifier::new(Vec::new()),
        1,
    );

    let first = rule_from_json(budget_rule("auto")).into_rule();
    let second = rule_from_json(prune_rule("auto")).into_rule();
    rules.add(&first).unwrap();
    rules.add(&second).unwrap();

    let summary = use_case.run_all(at(2026, 3, 10, 9, 0)).await.unwrap();
    assert_eq!(summary.rules, 2);
    assert_eq!(summary.errored, 2);
    assert!(summary.auto_disabled.is_empty());
    assert_eq!(summary.errors.len(), 2);
    assert!(summary.errors[0].contains("database is locked"));
    assert_eq!(runs.list(Some(&second.id), 10).unwrap().len(), 1);
    assert_eq!(runs.list(Some(&first.id), 10).unwrap().len(), 1);
}
