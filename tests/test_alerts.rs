mod common;

use adpilot::domain::error::DomainError;
use adpilot::domain::ports::action_queue::ActionFilter;
use adpilot::domain::ports::alert_repository::AlertFilter;
use adpilot::domain::values::action_status::{ActionOrigin, ActionStatus};
use adpilot::domain::values::alert_state::AlertState;
use adpilot::domain::values::entity_type::EntityRef;
use adpilot::domain::values::plan_tier::PlanTier;
use adpilot::AdPilot;
use chrono::NaiveDate;
use common::*;

async fn suggestion_alert(pilot: &AdPilot) -> String {
    add_rule(pilot, budget_rule("suggestion"));
    seed_campaign(pilot, "c1", 100.0);
    seed_campaign_day(pilot, "c1", NaiveDate::from_ymd_opt(2026, 3, 10).unwrap(), spend(85.0));
    let summary = pilot.evaluate(at(2026, 3, 10, 9, 36)).await.unwrap();
    assert_eq!(summary.alerts_created, 1);
    assert_eq!(summary.actions_enqueued, 0);
    pilot.alerts(&AlertFilter::default()).unwrap()[0].id.clone()
}

#[tokio::test]
async fn test_suggestion_alert_carries_proposals() {
    let (pilot, _) = setup();
    let id = suggestion_alert(&pilot).await;

    let alert = &pilot.alerts(&AlertFilter::default()).unwrap()[0];
    assert_eq!(alert.id, id);
    assert_eq!(alert.state, AlertState::New);
    assert!(!alert.protected);
    assert_eq!(alert.proposed_actions.len(), 1);
    assert_eq!(alert.proposed_actions[0].payload.budget_micros, Some(120_000_000));
    assert!(pilot.actions(&ActionFilter::default()).unwrap().is_empty());
}

#[tokio::test]
async fn test_approve_queues_with_the_evaluator_key() {
    let (pilot, _) = setup();
    // Approval is a user decision, so the free plan does not block it.
    set_plan(&pilot, PlanTier::Free);
    let id = suggestion_alert(&pilot).await;
    let proposal_key = pilot.alerts(&AlertFilter::default()).unwrap()[0].proposed_actions[0]
        .idempotency_key
        .clone();

    let report = pilot.approve(&id).unwrap();
    assert_eq!(report.enqueued.len(), 1);
    assert_eq!(report.duplicates, 0);

    let action = pilot.action_get(&report.enqueued[0]).unwrap();
    assert_eq!(action.origin, ActionOrigin::Approved);
    assert_eq!(action.status, ActionStatus::Queued);
    assert_eq!(action.idempotency_key, proposal_key);

    let alert = &pilot.alerts(&AlertFilter::default()).unwrap()[0];
    assert_eq!(alert.state, AlertState::Acknowledged);

    // A second approval finds the key already queued.
    let again = pilot.approve(&id).unwrap();
    assert!(again.enqueued.is_empty());
    assert_eq!(again.duplicates, 1);
    assert_eq!(pilot.actions(&ActionFilter::default()).unwrap().len(), 1);
}

#[tokio::test]
async fn test_approve_rejects_protected_entity() {
    let (pilot, _) = setup();
    let id = suggestion_alert(&pilot).await;
    pilot.protect(EntityRef::campaign("c1"), Some("hands off".into())).unwrap();

    let err = pilot.approve(&id).unwrap_err();
    assert!(matches!(err, DomainError::Validation(_)));
    assert!(pilot.actions(&ActionFilter::default()).unwrap().is_empty());
}

#[tokio::test]
async fn test_dry_run_alert_has_nothing_to_approve() {
    let (pilot, _) = setup();
    add_rule(&pilot, budget_rule("dry_run"));
    seed_campaign(&pilot, "c1", 100.0);
    seed_campaign_day(&pilot, "c1", NaiveDate::from_ymd_opt(2026, 3, 10).unwrap(), spend(85.0));
    pilot.evaluate(at(2026, 3, 10, 9, 36)).await.unwrap();
    let id = pilot.alerts(&AlertFilter::default()).unwrap()[0].id.clone();

    assert!(matches!(pilot.approve(&id), Err(DomainError::Validation(_))));
}

#[tokio::test]
async fn test_alert_lifecycle() {
    let (pilot, _) = setup();
    let id = suggestion_alert(&pilot).await;

    assert_eq!(pilot.alert_ack(&id).unwrap().state, AlertState::Acknowledged);
    let err = pilot.alert_ack(&id).unwrap_err();
    assert!(matches!(err, DomainError::IllegalTransition { .. }));

    assert_eq!(pilot.alert_mute(&id).unwrap().state, AlertState::Muted);
    assert!(pilot.approve(&id).is_err());

    let muted = pilot
        .alerts(&AlertFilter {
            state: Some(AlertState::Muted),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(muted.len(), 1);
}

#[tokio::test]
async fn test_unknown_alert_is_not_found() {
    let (pilot, _) = setup();
    assert!(matches!(pilot.alert_ack("missing"), Err(DomainError::NotFound(_))));
    assert!(matches!(pilot.approve("missing"), Err(DomainError::NotFound(_))));
}
