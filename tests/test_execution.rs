mod common;

use adpilot::domain::ports::action_queue::ActionFilter;
use adpilot::domain::ports::ads_platform::{ChangeRequest, PlatformError};
use adpilot::domain::values::action_status::{ActionOrigin, ActionStatus};
use adpilot::domain::values::entity_type::EntityRef;
use adpilot::domain::values::outcome_status::OutcomeStatus;
use adpilot::domain::values::plan_tier::PlanTier;
use chrono::{Duration, NaiveDate};
use common::*;
use serde_json::json;

fn march(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
}

fn pause_c1() -> adpilot::application::actions::ManualAction {
    manual("pause_campaign", json!({"campaign_id": "c1"}))
}

/// Queue the budget raise the depletion rule proposes for c1.
async fn queue_budget_raise(pilot: &adpilot::AdPilot) -> String {
    add_rule(pilot, budget_rule("auto"));
    seed_campaign(pilot, "c1", 100.0);
    seed_campaign_day(pilot, "c1", march(10), spend(85.0));
    let summary = pilot.evaluate(at(2026, 3, 10, 9, 36)).await.unwrap();
    assert_eq!(summary.actions_enqueued, 1);
    pilot.actions(&ActionFilter::default()).unwrap()[0].id.clone()
}

#[tokio::test]
async fn test_applied_action_records_before_state_and_outcome() {
    let (pilot, platform) = setup();
    set_plan(&pilot, PlanTier::Agency);
    let id = queue_budget_raise(&pilot).await;

    let summary = pilot.execute(None).await.unwrap();
    assert_eq!(summary.processed, 1);
    assert_eq!(summary.successful, 1);

    assert_eq!(
        platform.calls(),
        vec![ChangeRequest::SetCampaignBudget {
            campaign_id: "c1".into(),
            budget_micros: 120_000_000,
        }]
    );

    let action = pilot.action_get(&id).unwrap();
    assert_eq!(action.status, ActionStatus::Applied);
    assert_eq!(action.attempts, 1);
    let before = action.before_state.unwrap();
    assert_eq!(before.previous_budget_micros, Some(100_000_000));
    assert!(before.captured_at.is_some());

    let outcome = pilot.outcome_for_action(&id).unwrap().unwrap();
    assert_eq!(outcome.outcome_status, OutcomeStatus::Pending);
    assert_eq!(outcome.entity, EntityRef::campaign("c1"));
    assert_eq!(outcome.after_scheduled_at - action.applied_at.unwrap(), Duration::days(7));
}

#[tokio::test]
async fn test_before_metrics_cover_the_days_before_apply() {
    let (pilot, _) = setup();
    for d in 1..=7 {
        seed_campaign_day(&pilot, "c1", today() - Duration::days(d), spend(10.0));
    }
    seed_campaign_day(&pilot, "c1", today(), spend(500.0));
    seed_campaign_day(&pilot, "c1", today() - Duration::days(8), spend(500.0));

    let action = pilot.enqueue(pause_c1()).unwrap();
    pilot.execute(None).await.unwrap();

    let outcome = pilot.outcome_for_action(&action.id).unwrap().unwrap();
    assert!((outcome.before_metrics.spend - 70.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_transient_failures_are_retried() {
    let (pilot, platform) = setup();
    platform.fail_next(vec![
        PlatformError::Transient("429: throttled".into()),
        PlatformError::Timeout(1),
    ]);
    let action = pilot.enqueue(pause_c1()).unwrap();

    let summary = pilot.execute(None).await.unwrap();
    assert_eq!(summary.successful, 1);
    assert_eq!(platform.calls().len(), 3);

    let stored = pilot.action_get(&action.id).unwrap();
    assert_eq!(stored.status, ActionStatus::Applied);
    assert_eq!(stored.attempts, 3);
}

#[tokio::test]
async fn test_retries_stop_at_max_attempts() {
    let (pilot, platform) = setup();
    platform.fail_next(vec![
        PlatformError::Transient("503: unavailable".into()),
        PlatformError::Transient("503: unavailable".into()),
        PlatformError::Transient("503: unavailable".into()),
        PlatformError::Transient("503: unavailable".into()),
    ]);
    let action = pilot.enqueue(pause_c1()).unwrap();

    let summary = pilot.execute(None).await.unwrap();
    assert_eq!(summary.failed, 1);
    assert_eq!(platform.calls().len(), 3);

    let stored = pilot.action_get(&action.id).unwrap();
    assert_eq!(stored.status, ActionStatus::Failed);
    assert_eq!(stored.attempts, 3);
    assert!(stored.error.unwrap().contains("503"));
    assert!(pilot.outcome_for_action(&action.id).unwrap().is_none());
}

#[tokio::test]
async fn test_permanent_failure_is_not_retried() {
    let (pilot, platform) = setup();
    platform.fail_next(vec![PlatformError::Permanent("404: campaign archived".into())]);
    let action = pilot.enqueue(pause_c1()).unwrap();

    pilot.execute(None).await.unwrap();
    assert_eq!(platform.calls().len(), 1);

    let stored = pilot.action_get(&action.id).unwrap();
    assert_eq!(stored.status, ActionStatus::Failed);
    assert_eq!(stored.attempts, 1);
}

#[tokio::test]
async fn test_slow_platform_times_out() {
    let mut config = test_config();
    config.max_attempts = 2;
    let (pilot, platform) = setup_with(config, RecordingPlatform::with_delay(std::time::Duration::from_millis(1500)));
    let action = pilot.enqueue(pause_c1()).unwrap();

    pilot.execute(None).await.unwrap();
    assert_eq!(platform.calls().len(), 2);

    let stored = pilot.action_get(&action.id).unwrap();
    assert_eq!(stored.status, ActionStatus::Failed);
    assert!(stored.error.unwrap().contains("timed out"));
}

#[tokio::test]
async fn test_plan_downgrade_skips_auto_action() {
    let (pilot, platform) = setup();
    set_plan(&pilot, PlanTier::Agency);
    let id = queue_budget_raise(&pilot).await;
    set_plan(&pilot, PlanTier::Free);

    let summary = pilot.execute(None).await.unwrap();
    assert_eq!(summary.skipped, 1);
    assert!(platform.calls().is_empty());

    let action = pilot.action_get(&id).unwrap();
    assert_eq!(action.status, ActionStatus::Skipped);
    assert!(action.error.unwrap().contains("entitlement"));
}

#[tokio::test]
async fn test_protection_added_after_enqueue_skips_action() {
    let (pilot, platform) = setup();
    let action = pilot
        .enqueue(manual(
            "set_bid",
            json!({"campaign_id": "c1", "ad_group_id": "ag1", "keyword_id": "kw1", "bid_micros": 750_000}),
        ))
        .unwrap();
    pilot.protect(EntityRef::ad_group("ag1"), None).unwrap();

    let summary = pilot.execute(None).await.unwrap();
    assert_eq!(summary.skipped, 1);
    assert!(platform.calls().is_empty());

    let stored = pilot.action_get(&action.id).unwrap();
    assert_eq!(stored.status, ActionStatus::Skipped);
    assert_eq!(stored.error.as_deref(), Some("protected entity ad_group:ag1"));
}

#[tokio::test]
async fn test_manual_action_ignores_plan() {
    let (pilot, platform) = setup();
    set_plan(&pilot, PlanTier::Free);
    let action = pilot.enqueue(pause_c1()).unwrap();
    assert_eq!(action.origin, ActionOrigin::Manual);

    pilot.execute(None).await.unwrap();
    assert_eq!(platform.calls(), vec![ChangeRequest::PauseCampaign { campaign_id: "c1".into() }]);
    assert_eq!(pilot.action_get(&action.id).unwrap().status, ActionStatus::Applied);
}

#[tokio::test]
async fn test_created_entity_id_is_kept_for_revert() {
    let (pilot, _) = setup();
    let action = pilot
        .enqueue(manual(
            "negative_keyword",
            json!({"campaign_id": "c1", "ad_group_id": "ag1", "keyword_text": "free", "match_type": "negative_exact"}),
        ))
        .unwrap();
    pilot.execute(None).await.unwrap();

    let stored = pilot.action_get(&action.id).unwrap();
    assert_eq!(
        stored.before_state.unwrap().created_entity_id.as_deref(),
        Some("created-1")
    );
}

#[tokio::test]
async fn test_one_failure_does_not_abort_the_batch() {
    let (pilot, platform) = setup();
    platform.fail_next(vec![PlatformError::Validation("400: bad budget".into())]);
    pilot.enqueue(pause_c1()).unwrap();
    pilot
        .enqueue(manual("pause_campaign", json!({"campaign_id": "c2"})))
        .unwrap();

    let summary = pilot.execute(None).await.unwrap();
    assert_eq!(summary.processed, 2);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.successful, 1);

    // Nothing left to claim.
    assert_eq!(pilot.execute(None).await.unwrap().processed, 0);
}

#[tokio::test]
async fn test_batch_size_limits_claims() {
    let (pilot, _) = setup();
    for i in 0..4 {
        pilot
            .enqueue(manual("pause_campaign", json!({"campaign_id": format!("c{i}")})))
            .unwrap();
    }
    assert_eq!(pilot.execute(Some(3)).await.unwrap().processed, 3);
    assert_eq!(pilot.execute(Some(3)).await.unwrap().processed, 1);
}

#[tokio::test]
async fn test_overlapping_workers_apply_each_action_once() {
    let config = adpilot::config::AutomationConfig {
        claim_lease_secs: 1,
        api_timeout_secs: 5,
        ..test_config()
    };
    let (pilot, platform) = setup_with(config, RecordingPlatform::with_delay(std::time::Duration::from_millis(1500)));
    let first = pilot.enqueue(pause_c1()).unwrap();
    let second = pilot
        .enqueue(manual("pause_campaign", json!({"campaign_id": "c2"})))
        .unwrap();

    // The second worker starts after the first one's lease has run out.
    let (a, b) = tokio::join!(pilot.execute(None), async {
        tokio::time::sleep(std::time::Duration::from_millis(1200)).await;
        pilot.execute(None).await
    });
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_eq!(platform.calls().len(), 2);
    assert_eq!(a.successful + b.successful, 2);
    assert_eq!(a.failed + b.failed, 0);
    assert!(a.errors.is_empty() && b.errors.is_empty());
    for id in [&first.id, &second.id] {
        assert_eq!(pilot.action_get(id).unwrap().status, ActionStatus::Applied);
        assert!(pilot.outcome_for_action(id).unwrap().is_some());
    }
}
