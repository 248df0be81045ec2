//! Shared test helpers.
#![allow(dead_code)]

use adpilot::application::actions::ManualAction;
use adpilot::application::rules::NewRule;
use adpilot::config::AutomationConfig;
use adpilot::domain::entities::automation_rule::AutomationRule;
use adpilot::domain::ports::ads_platform::{AdsPlatform, ApplyReceipt, ChangeRequest, PlatformError};
use adpilot::domain::values::entity_type::EntityRef;
use adpilot::domain::values::metrics::EntityMetrics;
use adpilot::domain::values::plan_tier::PlanTier;
use adpilot::infrastructure::sqlite::metrics_store::{CampaignRecord, EntityDayRecord, SearchTermDayRecord};
use adpilot::AdPilot;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const PROFILE: &str = "profile-1";
pub const USER: &str = "user-1";

/// Ads platform double: records every change and fails on demand.
#[derive(Default)]
pub struct RecordingPlatform {
    calls: Mutex<Vec<ChangeRequest>>,
    failures: Mutex<VecDeque<PlatformError>>,
    delay: Option<Duration>,
    created: AtomicU64,
}

impl RecordingPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call sleeps this long before answering.
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Default::default()
        }
    }

    /// The next calls fail with these errors, in order.
    pub fn fail_next(&self, errors: Vec<PlatformError>) {
        self.failures.lock().unwrap().extend(errors);
    }

    pub fn calls(&self) -> Vec<ChangeRequest> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl AdsPlatform for RecordingPlatform {
    fn name(&self) -> &str {
        "recording"
    }

    async fn apply(&self, _profile_id: &str, change: &ChangeRequest) -> Result<ApplyReceipt, PlatformError> {
        self.calls.lock().unwrap().push(change.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(err) = self.failures.lock().unwrap().pop_front() {
            return Err(err);
        }
        let created_entity_id = match change {
            ChangeRequest::CreateKeyword { .. } | ChangeRequest::CreateNegativeKeyword { .. } => {
                Some(format!("created-{}", self.created.fetch_add(1, Ordering::Relaxed) + 1))
            }
            _ => None,
        };
        Ok(ApplyReceipt { created_entity_id })
    }
}

pub fn test_config() -> AutomationConfig {
    AutomationConfig {
        database_path: ":memory:".into(),
        backoff_base_ms: 1,
        api_timeout_secs: 1,
        inter_action_delay_ms: 0,
        ..Default::default()
    }
}

pub fn setup() -> (AdPilot, Arc<RecordingPlatform>) {
    setup_with(test_config(), RecordingPlatform::new())
}

pub fn setup_with(config: AutomationConfig, platform: RecordingPlatform) -> (AdPilot, Arc<RecordingPlatform>) {
    let platform = Arc::new(platform);
    let pilot = AdPilot::with_providers(config, platform.clone(), Vec::new()).unwrap();
    (pilot, platform)
}

pub fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
}

pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

pub fn rule_from_json(json: serde_json::Value) -> NewRule {
    let mut base = serde_json::json!({
        "user_id": USER,
        "profile_id": PROFILE,
        "name": "test rule",
    });
    if let (Some(base), Some(extra)) = (base.as_object_mut(), json.as_object()) {
        for (k, v) in extra {
            base.insert(k.clone(), v.clone());
        }
    }
    serde_json::from_value(base).unwrap()
}

pub fn add_rule(pilot: &AdPilot, json: serde_json::Value) -> AutomationRule {
    pilot.rule_add(rule_from_json(json)).unwrap()
}

pub fn budget_rule(mode: &str) -> serde_json::Value {
    serde_json::json!({
        "rule_type": "budget_depletion",
        "params": {"percentThreshold": 80, "beforeHourLocal": 18},
        "mode": mode,
        "action": {"type": "raise_budget", "percent": 20},
    })
}

pub fn prune_rule(mode: &str) -> serde_json::Value {
    serde_json::json!({
        "rule_type": "search_term_prune",
        "params": {"windowDays": 30, "minClicks": 20, "minSpend": 10, "maxConvs": 0, "negateScope": "ad_group"},
        "mode": mode,
        "action": {"type": "negative_keyword", "matchType": "negative_exact"},
    })
}

/// A manual action with a fresh idempotency key.
pub fn manual(action_type: &str, payload: serde_json::Value) -> ManualAction {
    serde_json::from_value(serde_json::json!({
        "profile_id": PROFILE,
        "user_id": USER,
        "action_type": action_type,
        "payload": payload,
    }))
    .unwrap()
}

pub fn set_plan(pilot: &AdPilot, plan: PlanTier) {
    pilot.plan_set(USER, plan).unwrap();
}

pub fn seed_campaign(pilot: &AdPilot, campaign_id: &str, daily_budget: f64) {
    pilot
        .metrics_store()
        .record_campaign(
            PROFILE,
            &CampaignRecord {
                campaign_id: campaign_id.into(),
                name: format!("Campaign {campaign_id}"),
                enabled: true,
                daily_budget,
            },
        )
        .unwrap();
}

pub fn seed_campaign_day(pilot: &AdPilot, campaign_id: &str, date: NaiveDate, metrics: EntityMetrics) {
    pilot
        .metrics_store()
        .record_entity_day(
            PROFILE,
            &EntityDayRecord {
                entity: EntityRef::campaign(campaign_id),
                date,
                metrics,
                impression_share: None,
            },
        )
        .unwrap();
}

pub fn spend(amount: f64) -> EntityMetrics {
    EntityMetrics {
        spend: amount,
        ..Default::default()
    }
}

/// A wasteful term: 25 clicks, 12.00 spend, no orders.
pub fn seed_wasted_term(pilot: &AdPilot, campaign_id: &str, ad_group_id: &str, term: &str, date: NaiveDate) {
    pilot
        .metrics_store()
        .record_search_term_day(
            PROFILE,
            &SearchTermDayRecord {
                campaign_id: campaign_id.into(),
                ad_group_id: ad_group_id.into(),
                search_term: term.into(),
                date,
                metrics: EntityMetrics {
                    spend: 12.0,
                    clicks: 25,
                    impressions: 400,
                    sales: 0.0,
                    orders: 0,
                },
            },
        )
        .unwrap();
}
