mod common;

use adpilot::domain::error::DomainError;
use adpilot::domain::ports::action_queue::ActionFilter;
use adpilot::domain::ports::ads_platform::PlatformError;
use adpilot::domain::values::action_status::ActionStatus;
use adpilot::domain::values::plan_tier::PlanTier;
use adpilot::domain::values::rule_mode::RuleMode;
use adpilot::domain::values::rule_type::RuleType;
use chrono::{NaiveDate, Utc};
use common::*;
use serde_json::json;

#[test]
fn test_add_and_get_rule() {
    let (pilot, _) = setup();
    let rule = add_rule(&pilot, budget_rule("suggestion"));

    let stored = pilot.rule_get(&rule.id).unwrap();
    assert_eq!(stored.rule_type(), RuleType::BudgetDepletion);
    assert_eq!(stored.mode, RuleMode::Suggestion);
    assert!(stored.enabled);
}

#[test]
fn test_invalid_rules_are_rejected() {
    let (pilot, _) = setup();

    let bad_window = rule_from_json(json!({
        "rule_type": "search_term_prune",
        "params": {"windowDays": 0},
    }));
    assert!(matches!(pilot.rule_add(bad_window), Err(DomainError::Validation(_))));

    let wrong_action = rule_from_json(json!({
        "rule_type": "spend_spike",
        "params": {},
        "action": {"type": "raise_budget", "percent": 10},
    }));
    let err = pilot.rule_add(wrong_action).unwrap_err();
    assert!(err.to_string().contains("raise_budget"));

    let positive_negative = rule_from_json(json!({
        "rule_type": "search_term_prune",
        "params": {},
        "action": {"type": "negative_keyword", "matchType": "exact"},
    }));
    assert!(pilot.rule_add(positive_negative).is_err());

    assert!(pilot.rules(None, None).unwrap().is_empty());
}

#[test]
fn test_enable_disable_and_filters() {
    let (pilot, _) = setup();
    let a = add_rule(&pilot, budget_rule("dry_run"));
    let b = add_rule(&pilot, prune_rule("dry_run"));

    let disabled = pilot.rule_disable(&a.id, Some("seasonal pause")).unwrap();
    assert!(!disabled.enabled);
    assert_eq!(disabled.disabled_reason.as_deref(), Some("seasonal pause"));

    let enabled = pilot.rules(None, Some(true)).unwrap();
    assert_eq!(enabled.len(), 1);
    assert_eq!(enabled[0].id, b.id);
    assert_eq!(pilot.rules(Some(PROFILE.into()), None).unwrap().len(), 2);
    assert!(pilot.rules(Some("other".into()), None).unwrap().is_empty());

    let back = pilot.rule_enable(&a.id).unwrap();
    assert!(back.enabled);
    assert!(back.disabled_reason.is_none());

    assert!(matches!(pilot.rule_enable("missing"), Err(DomainError::NotFound(_))));
}

#[test]
fn test_update_revalidates() {
    let (pilot, _) = setup();
    let mut rule = add_rule(&pilot, budget_rule("dry_run"));
    rule.name = "Pacing guard".into();
    rule.mode = RuleMode::Auto;
    let updated = pilot.rule_update(rule.clone()).unwrap();
    assert_eq!(pilot.rule_get(&updated.id).unwrap().name, "Pacing guard");

    rule.name = "  ".into();
    assert!(pilot.rule_update(rule).is_err());
}

#[tokio::test]
async fn test_disabled_rule_is_not_evaluated() {
    let (pilot, _) = setup();
    let rule = add_rule(&pilot, budget_rule("dry_run"));
    pilot.rule_disable(&rule.id, None).unwrap();

    let summary = pilot.evaluate(at(2026, 3, 10, 9, 36)).await.unwrap();
    assert_eq!(summary.rules, 0);
    assert!(pilot.runs(None, 10).unwrap().is_empty());
}

#[tokio::test]
async fn test_daily_cap_skips_excess_actions() {
    let (pilot, _) = setup();
    set_plan(&pilot, PlanTier::Pro);
    let mut def = prune_rule("auto");
    def["throttle"] = json!({"cooldownHours": 0, "maxActionsPerDay": 2});
    add_rule(&pilot, def);
    let day = NaiveDate::from_ymd_opt(2026, 3, 9).unwrap();
    for term in ["free widget", "widget repair", "widget manual pdf"] {
        seed_wasted_term(&pilot, "c1", "ag1", term, day);
    }

    let summary = pilot.evaluate(at(2026, 3, 10, 12, 0)).await.unwrap();
    assert_eq!(summary.alerts_created, 3);
    assert_eq!(summary.actions_enqueued, 2);
    assert_eq!(summary.actions_skipped, 1);

    let skipped = pilot
        .actions(&ActionFilter {
            status: Some(ActionStatus::Skipped),
            ..Default::default()
        })
        .unwrap();
    assert!(skipped[0].error.as_deref().unwrap().contains("maxActionsPerDay=2"));
}

#[tokio::test]
async fn test_cooldown_follows_last_applied_action() {
    let (pilot, _) = setup();
    set_plan(&pilot, PlanTier::Pro);
    let mut def = prune_rule("auto");
    def["throttle"] = json!({"cooldownHours": 6, "maxActionsPerDay": 25});
    add_rule(&pilot, def);

    seed_wasted_term(&pilot, "c1", "ag1", "free widget", today());
    assert_eq!(pilot.evaluate(Utc::now()).await.unwrap().actions_enqueued, 1);
    assert_eq!(pilot.execute(None).await.unwrap().successful, 1);

    seed_wasted_term(&pilot, "c1", "ag1", "widget repair", today());
    let summary = pilot.evaluate(Utc::now()).await.unwrap();
    assert_eq!(summary.actions_enqueued, 0);
    assert_eq!(summary.actions_skipped, 1);
}

#[tokio::test]
async fn test_throttle_denial_only_holds_while_the_cap_is_reached() {
    let (pilot, platform) = setup();
    set_plan(&pilot, PlanTier::Pro);
    let mut def = prune_rule("auto");
    def["throttle"] = json!({"cooldownHours": 0, "maxActionsPerDay": 1});
    add_rule(&pilot, def);
    let day = NaiveDate::from_ymd_opt(2026, 3, 9).unwrap();
    seed_wasted_term(&pilot, "c1", "ag1", "free widget", day);
    seed_wasted_term(&pilot, "c1", "ag1", "widget repair", day);

    let first = pilot.evaluate(at(2026, 3, 10, 12, 0)).await.unwrap();
    assert_eq!(first.actions_enqueued, 1);
    assert_eq!(first.actions_skipped, 1);

    // The admitted action fails, which frees the day's only slot.
    platform.fail_next(vec![PlatformError::Permanent("404: ad group archived".into())]);
    assert_eq!(pilot.execute(None).await.unwrap().failed, 1);

    let second = pilot.evaluate(at(2026, 3, 10, 12, 15)).await.unwrap();
    assert_eq!(second.actions_enqueued, 1);
    assert_eq!(second.actions_skipped, 0);

    // Cap reached again; nothing new is queued or recorded.
    let third = pilot.evaluate(at(2026, 3, 10, 12, 30)).await.unwrap();
    assert_eq!(third.actions_enqueued, 0);
    assert_eq!(third.actions_skipped, 0);

    let queued = pilot
        .actions(&ActionFilter {
            status: Some(ActionStatus::Queued),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(queued.len(), 1);
    let skipped = pilot
        .actions(&ActionFilter {
            status: Some(ActionStatus::Skipped),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(skipped.len(), 1);
    assert_ne!(skipped[0].idempotency_key, queued[0].idempotency_key);
}
