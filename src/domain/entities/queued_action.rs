use crate::domain::error::DomainError;
use crate::domain::values::action_status::{ActionOrigin, ActionStatus};
use crate::domain::values::action_type::ActionType;
use crate::domain::values::entity_type::{EntityRef, EntityType};
use crate::domain::values::idempotency::skip_record_key;
use crate::domain::values::metrics::EntityMetrics;
use crate::domain::values::rule_type::RuleType;
use crate::domain::values::targeting::{MatchType, Placement};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Largest placement adjustment the platform accepts, in percent.
pub const MAX_PLACEMENT_PERCENT: i32 = 900;

/// Action-specific fields. Which ones are required depends on the action type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub campaign_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ad_group_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keyword_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keyword_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_type: Option<MatchType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bid_micros: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget_micros: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placement: Option<Placement>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percentage: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_bid_micros: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_budget_micros: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_percentage: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ActionPayload {
    /// Check that every field the action type needs is present and sane.
    pub fn validate(&self, action_type: ActionType) -> Result<(), DomainError> {
        let missing = |field: &str| {
            DomainError::Validation(format!("{action_type} requires {field}"))
        };
        self.campaign_id.as_ref().ok_or_else(|| missing("campaign_id"))?;

        match action_type {
            ActionType::PauseCampaign => {}
            ActionType::CreateKeyword => {
                self.ad_group_id.as_ref().ok_or_else(|| missing("ad_group_id"))?;
                require_text(&self.keyword_text, action_type)?;
                let mt = self.match_type.ok_or_else(|| missing("match_type"))?;
                if mt.is_negative() {
                    return Err(DomainError::Validation(format!(
                        "{action_type} cannot use negative match type {mt}"
                    )));
                }
                require_positive(self.bid_micros, "bid_micros", action_type)?;
            }
            ActionType::NegativeKeyword => {
                require_text(&self.keyword_text, action_type)?;
                let mt = self.match_type.ok_or_else(|| missing("match_type"))?;
                if !mt.is_negative() {
                    return Err(DomainError::Validation(format!(
                        "{action_type} requires a negative match type, got {mt}"
                    )));
                }
            }
            ActionType::SetBid => {
                if self.keyword_id.is_none() && self.target_id.is_none() {
                    return Err(missing("keyword_id or target_id"));
                }
                require_positive(self.bid_micros, "bid_micros", action_type)?;
            }
            ActionType::SetPlacementAdjust => {
                self.placement.ok_or_else(|| missing("placement"))?;
                let pct = self.percentage.ok_or_else(|| missing("percentage"))?;
                if !(0..=MAX_PLACEMENT_PERCENT).contains(&pct) {
                    return Err(DomainError::Validation(format!(
                        "{action_type} percentage must be between 0 and {MAX_PLACEMENT_PERCENT}, got {pct}"
                    )));
                }
            }
            ActionType::SetCampaignBudget => {
                require_positive(self.budget_micros, "budget_micros", action_type)?;
            }
        }
        Ok(())
    }

    /// Every entity this change touches, broadest first, for protection checks.
    pub fn lineage(&self) -> Vec<EntityRef> {
        let mut refs = Vec::with_capacity(4);
        if let Some(id) = &self.campaign_id {
            refs.push(EntityRef::new(EntityType::Campaign, id.clone()));
        }
        if let Some(id) = &self.ad_group_id {
            refs.push(EntityRef::new(EntityType::AdGroup, id.clone()));
        }
        if let Some(id) = &self.keyword_id {
            refs.push(EntityRef::new(EntityType::Keyword, id.clone()));
        }
        if let Some(id) = &self.target_id {
            refs.push(EntityRef::new(EntityType::Target, id.clone()));
        }
        refs
    }

    /// The entity whose performance measures this change.
    pub fn subject(&self, action_type: ActionType) -> Option<EntityRef> {
        let campaign = || self.campaign_id.clone().map(EntityRef::campaign);
        match action_type {
            ActionType::SetBid => self
                .keyword_id
                .clone()
                .map(|id| EntityRef::new(EntityType::Keyword, id))
                .or_else(|| {
                    self.target_id
                        .clone()
                        .map(|id| EntityRef::new(EntityType::Target, id))
                }),
            ActionType::CreateKeyword | ActionType::NegativeKeyword => {
                self.ad_group_id.clone().map(EntityRef::ad_group).or_else(campaign)
            }
            ActionType::PauseCampaign
            | ActionType::SetPlacementAdjust
            | ActionType::SetCampaignBudget => campaign(),
        }
    }
}

fn require_text(value: &Option<String>, action_type: ActionType) -> Result<(), DomainError> {
    match value {
        Some(t) if !t.trim().is_empty() => Ok(()),
        _ => Err(DomainError::Validation(format!(
            "{action_type} requires keyword_text"
        ))),
    }
}

fn require_positive(value: Option<i64>, field: &str, action_type: ActionType) -> Result<(), DomainError> {
    match value {
        Some(v) if v > 0 => Ok(()),
        Some(v) => Err(DomainError::Validation(format!(
            "{action_type} requires positive {field}, got {v}"
        ))),
        None => Err(DomainError::Validation(format!(
            "{action_type} requires {field}"
        ))),
    }
}

/// A change a rule wants to make, before gating and queuing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposedAction {
    pub action_type: ActionType,
    pub payload: ActionPayload,
    /// Entity whose performance the change is judged by.
    pub entity: EntityRef,
    /// Derived from (rule, matched item, action type, trigger day).
    pub idempotency_key: String,
}

/// State captured when an action is applied; enough to undo it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BeforeState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_bid_micros: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_budget_micros: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_percentage: Option<i32>,
    /// Platform id of an entity the action created (keyword, negative keyword).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_entity_id: Option<String>,
    pub metrics: EntityMetrics,
    pub captured_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuedAction {
    pub id: String,
    /// `None` for manual bulk actions.
    pub rule_id: Option<String>,
    pub rule_type: Option<RuleType>,
    pub origin: ActionOrigin,
    pub profile_id: String,
    pub user_id: String,
    pub action_type: ActionType,
    pub payload: ActionPayload,
    pub idempotency_key: String,
    pub status: ActionStatus,
    pub before_state: Option<BeforeState>,
    pub error: Option<String>,
    pub attempts: u32,
    pub created_at: DateTime<Utc>,
    pub applied_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
    /// Claim token of the worker holding the action, set by dequeue.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claimed_by: Option<String>,
}

impl QueuedAction {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        rule_id: Option<String>,
        rule_type: Option<RuleType>,
        origin: ActionOrigin,
        profile_id: String,
        user_id: String,
        action_type: ActionType,
        payload: ActionPayload,
        idempotency_key: String,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            rule_id,
            rule_type,
            origin,
            profile_id,
            user_id,
            action_type,
            payload,
            idempotency_key,
            status: ActionStatus::Queued,
            before_state: None,
            error: None,
            attempts: 0,
            created_at: now,
            applied_at: None,
            updated_at: now,
            claimed_by: None,
        }
    }

    /// Record a policy denial at admission time instead of queuing. The
    /// record is keyed apart from the action so the denial only holds for now.
    pub fn into_skipped(mut self, reason: String) -> Self {
        self.idempotency_key = skip_record_key(&self.idempotency_key);
        self.status = ActionStatus::Skipped;
        self.error = Some(reason);
        self
    }

    pub fn transition(&mut self, next: ActionStatus, now: DateTime<Utc>) -> Result<(), DomainError> {
        if !self.status.can_transition_to(next) {
            return Err(DomainError::IllegalTransition {
                entity: "action",
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        self.status = next;
        self.updated_at = now;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bid_payload() -> ActionPayload {
        ActionPayload {
            campaign_id: Some("c1".into()),
            ad_group_id: Some("ag1".into()),
            keyword_id: Some("kw1".into()),
            bid_micros: Some(450_000),
            ..Default::default()
        }
    }

    #[test]
    fn test_set_bid_requires_bid() {
        let mut p = bid_payload();
        assert!(p.validate(ActionType::SetBid).is_ok());
        p.bid_micros = None;
        let err = p.validate(ActionType::SetBid).unwrap_err();
        assert!(err.to_string().contains("bid_micros"));
    }

    #[test]
    fn test_negative_keyword_rejects_positive_match() {
        let p = ActionPayload {
            campaign_id: Some("c1".into()),
            keyword_text: Some("cheap widgets".into()),
            match_type: Some(MatchType::Exact),
            ..Default::default()
        };
        assert!(p.validate(ActionType::NegativeKeyword).is_err());
    }

    #[test]
    fn test_lineage_lists_all_ids() {
        let refs = bid_payload().lineage();
        assert_eq!(refs.len(), 3);
        assert_eq!(refs[0], EntityRef::campaign("c1"));
        assert_eq!(refs[2].entity_type, EntityType::Keyword);
    }

    #[test]
    fn test_subject_prefers_keyword_for_bids() {
        let s = bid_payload().subject(ActionType::SetBid).unwrap();
        assert_eq!(s.entity_id, "kw1");
        let s = bid_payload().subject(ActionType::PauseCampaign).unwrap();
        assert_eq!(s.entity_id, "c1");
    }

    #[test]
    fn test_applied_action_cannot_fail() {
        let mut a = QueuedAction::new(
            None,
            None,
            ActionOrigin::Manual,
            "p".into(),
            "u".into(),
            ActionType::SetBid,
            bid_payload(),
            "k".into(),
            Utc::now(),
        );
        assert!(a.transition(ActionStatus::Applied, Utc::now()).is_err());
        a.transition(ActionStatus::Applying, Utc::now()).unwrap();
        a.transition(ActionStatus::Applied, Utc::now()).unwrap();
        assert!(a.transition(ActionStatus::Failed, Utc::now()).is_err());
    }
}
