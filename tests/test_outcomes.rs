mod common;

use adpilot::domain::entities::action_outcome::ActionOutcome;
use adpilot::domain::ports::outcome_repository::OutcomeRepository;
use adpilot::domain::values::entity_type::EntityRef;
use adpilot::domain::values::metrics::EntityMetrics;
use adpilot::domain::values::outcome_status::OutcomeStatus;
use adpilot::infrastructure::sqlite::migrations::run_migrations;
use adpilot::infrastructure::sqlite::outcome_repo::SqliteOutcomeRepo;
use adpilot::infrastructure::sqlite::{open_connection, shared};
use adpilot::AdPilot;
use chrono::{Duration, Utc};
use common::*;
use serde_json::json;

fn daily(spend: f64, sales: f64, orders: i64) -> EntityMetrics {
    EntityMetrics {
        spend,
        sales,
        orders,
        clicks: 20,
        impressions: 500,
    }
}

/// Seven days of c1 history before today, then apply a pause on c1.
async fn applied_pause(pilot: &AdPilot, before: EntityMetrics) -> String {
    for d in 1..=7 {
        seed_campaign_day(pilot, "c1", today() - Duration::days(d), before);
    }
    let action = pilot
        .enqueue(manual("pause_campaign", json!({"campaign_id": "c1"})))
        .unwrap();
    assert_eq!(pilot.execute(None).await.unwrap().successful, 1);
    action.id
}

/// The seven complete days ending the day before collection is scheduled.
fn seed_after(pilot: &AdPilot, after: EntityMetrics) {
    for d in 0..7 {
        seed_campaign_day(pilot, "c1", today() + Duration::days(d), after);
    }
}

#[tokio::test]
async fn test_nothing_due_before_lookback_elapses() {
    let (pilot, _) = setup();
    applied_pause(&pilot, daily(10.0, 20.0, 1)).await;

    let summary = pilot.collect(Utc::now() + Duration::days(3), 100).unwrap();
    assert_eq!(summary.due, 0);
}

#[tokio::test]
async fn test_improved_metrics_score_positive() {
    let (pilot, _) = setup();
    let id = applied_pause(&pilot, daily(10.0, 20.0, 1)).await;
    // ACoS 50% -> 25%, ROAS 2 -> 4, cost per order 10 -> 5.
    seed_after(&pilot, daily(10.0, 40.0, 2));
    // The collection day itself is still incomplete and stays out.
    seed_campaign_day(&pilot, "c1", today() + Duration::days(7), daily(500.0, 10.0, 1));

    let summary = pilot.collect(Utc::now() + Duration::days(8), 100).unwrap();
    assert_eq!(summary.due, 1);
    assert_eq!(summary.positive, 1);

    let outcome = pilot.outcome_for_action(&id).unwrap().unwrap();
    assert_eq!(outcome.outcome_status, OutcomeStatus::Positive);
    let score = outcome.outcome_score.unwrap();
    assert!((score - 2.0 / 3.0).abs() < 1e-9, "score {score}");
    assert!((outcome.after_metrics.unwrap().sales - 280.0).abs() < 1e-9);
    assert!(outcome.metric_delta.is_some());
    assert!(outcome.collected_at.is_some());
}

#[tokio::test]
async fn test_worse_metrics_score_negative() {
    let (pilot, _) = setup();
    let id = applied_pause(&pilot, daily(10.0, 20.0, 1)).await;
    // ACoS 50% -> 100%, ROAS 2 -> 1, cost per order unchanged.
    seed_after(&pilot, daily(10.0, 10.0, 1));

    pilot.collect(Utc::now() + Duration::days(8), 100).unwrap();
    let outcome = pilot.outcome_for_action(&id).unwrap().unwrap();
    assert_eq!(outcome.outcome_status, OutcomeStatus::Negative);
    assert!((outcome.outcome_score.unwrap() + 0.5).abs() < 1e-9);
}

#[tokio::test]
async fn test_missing_after_data_is_inconclusive() {
    let (pilot, _) = setup();
    let id = applied_pause(&pilot, daily(10.0, 20.0, 1)).await;

    let summary = pilot.collect(Utc::now() + Duration::days(8), 100).unwrap();
    assert_eq!(summary.inconclusive, 1);
    let outcome = pilot.outcome_for_action(&id).unwrap().unwrap();
    assert_eq!(outcome.outcome_status, OutcomeStatus::Inconclusive);
    assert!(outcome.outcome_score.is_none());
}

#[tokio::test]
async fn test_reverted_action_is_inconclusive() {
    let (pilot, _) = setup();
    let id = applied_pause(&pilot, daily(10.0, 20.0, 1)).await;
    seed_after(&pilot, daily(10.0, 40.0, 2));
    assert!(pilot.revert(&id).await.unwrap().reverted);

    pilot.collect(Utc::now() + Duration::days(8), 100).unwrap();
    let outcome = pilot.outcome_for_action(&id).unwrap().unwrap();
    assert_eq!(outcome.outcome_status, OutcomeStatus::Inconclusive);
    assert!(outcome.outcome_score.is_none());
}

#[tokio::test]
async fn test_collecting_twice_measures_once() {
    let (pilot, _) = setup();
    applied_pause(&pilot, daily(10.0, 20.0, 1)).await;
    seed_after(&pilot, daily(10.0, 40.0, 2));

    let later = Utc::now() + Duration::days(8);
    assert_eq!(pilot.collect(later, 100).unwrap().collected, 1);
    let again = pilot.collect(later, 100).unwrap();
    assert_eq!(again.due, 0);
    assert_eq!(again.collected, 0);
}

#[test]
fn test_complete_if_pending_writes_once() {
    let conn = open_connection(":memory:").unwrap();
    run_migrations(&conn).unwrap();
    let repo = SqliteOutcomeRepo::new(shared(conn));

    let applied = Utc::now() - Duration::days(8);
    let pending = ActionOutcome::pending("a1", PROFILE, EntityRef::campaign("c1"), daily(10.0, 20.0, 1), applied, 7);
    repo.create(&pending).unwrap();
    assert_eq!(repo.due(Utc::now(), 10).unwrap().len(), 1);

    let mut first = pending.clone();
    first
        .complete(Some(daily(10.0, 40.0, 2)), Some(0.6), OutcomeStatus::Positive, Utc::now())
        .unwrap();
    let mut second = pending;
    second
        .complete(Some(daily(10.0, 5.0, 0)), Some(-0.9), OutcomeStatus::Negative, Utc::now())
        .unwrap();

    assert_eq!(repo.complete_if_pending(&first).unwrap(), 1);
    assert_eq!(repo.complete_if_pending(&second).unwrap(), 0);

    let stored = repo.get_by_action("a1").unwrap().unwrap();
    assert_eq!(stored.outcome_status, OutcomeStatus::Positive);
    assert!(repo.due(Utc::now(), 10).unwrap().is_empty());
}
