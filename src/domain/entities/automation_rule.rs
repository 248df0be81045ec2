use crate::domain::error::DomainError;
use crate::domain::values::rule_mode::RuleMode;
use crate::domain::values::rule_type::RuleType;
use crate::domain::values::severity::Severity;
use crate::domain::values::targeting::{MatchType, NegateScope};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Longest window any condition may scan.
pub const MAX_WINDOW_DAYS: u32 = 90;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutomationRule {
    pub id: String,
    pub user_id: String,
    pub profile_id: String,
    pub name: String,
    #[serde(flatten)]
    pub params: RuleParams,
    pub mode: RuleMode,
    pub severity: Severity,
    pub action: RuleAction,
    pub throttle: ThrottlePolicy,
    pub enabled: bool,
    pub disabled_reason: Option<String>,
    /// Defines the profile-local day used for pacing and throttling.
    #[serde(default)]
    pub profile_utc_offset_minutes: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AutomationRule {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        user_id: String,
        profile_id: String,
        name: String,
        params: RuleParams,
        mode: RuleMode,
        severity: Severity,
        action: RuleAction,
        throttle: ThrottlePolicy,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id,
            profile_id,
            name,
            params,
            mode,
            severity,
            action,
            throttle,
            enabled: true,
            disabled_reason: None,
            profile_utc_offset_minutes: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn rule_type(&self) -> RuleType {
        self.params.rule_type()
    }

    /// Reject malformed params or an action the rule type cannot produce.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.name.trim().is_empty() {
            return Err(DomainError::Validation("rule name must not be empty".into()));
        }
        if self.profile_id.trim().is_empty() || self.user_id.trim().is_empty() {
            return Err(DomainError::Validation(
                "rule requires a profile_id and a user_id".into(),
            ));
        }
        self.params.validate()?;
        self.action.validate_for(self.rule_type())?;
        self.throttle.validate()
    }
}

/// Condition parameters, one struct per rule type.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "rule_type", content = "params", rename_all = "snake_case")]
pub enum RuleParams {
    BudgetDepletion(BudgetDepletionParams),
    SpendSpike(SpendSpikeParams),
    SearchTermHarvest(HarvestParams),
    SearchTermPrune(PruneParams),
    BidDown(BidAdjustParams),
    BidUp(BidAdjustParams),
    PlacementOpt(PlacementParams),
}

impl RuleParams {
    pub fn rule_type(&self) -> RuleType {
        match self {
            RuleParams::BudgetDepletion(_) => RuleType::BudgetDepletion,
            RuleParams::SpendSpike(_) => RuleType::SpendSpike,
            RuleParams::SearchTermHarvest(_) => RuleType::SearchTermHarvest,
            RuleParams::SearchTermPrune(_) => RuleType::SearchTermPrune,
            RuleParams::BidDown(_) => RuleType::BidDown,
            RuleParams::BidUp(_) => RuleType::BidUp,
            RuleParams::PlacementOpt(_) => RuleType::PlacementOpt,
        }
    }

    /// Days of history the condition reads.
    pub fn lookback_days(&self) -> u32 {
        match self {
            RuleParams::BudgetDepletion(_) => 1,
            RuleParams::SpendSpike(p) => p.lookback_days + 1,
            RuleParams::SearchTermHarvest(p) => p.window_days,
            RuleParams::SearchTermPrune(p) => p.window_days,
            RuleParams::BidDown(p) | RuleParams::BidUp(p) => p.window_days,
            RuleParams::PlacementOpt(p) => p.window_days,
        }
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        match self {
            RuleParams::BudgetDepletion(p) => {
                ensure(p.percent_threshold > 0.0, "percentThreshold must be positive")?;
                ensure(
                    (1..=24).contains(&p.before_hour_local),
                    "beforeHourLocal must be between 1 and 24",
                )
            }
            RuleParams::SpendSpike(p) => {
                ensure_window(p.lookback_days, "lookbackDays")?;
                ensure(p.lookback_days >= 2, "lookbackDays must be at least 2")?;
                ensure(p.stdev_multiplier > 0.0, "stdevMultiplier must be positive")?;
                ensure(p.min_spend >= 0.0, "minSpend must not be negative")
            }
            RuleParams::SearchTermHarvest(p) => {
                ensure_window(p.window_days, "windowDays")?;
                ensure(p.min_convs >= 1, "minConvs must be at least 1")?;
                ensure(p.max_acos > 0.0, "maxAcos must be positive")?;
                ensure(
                    !p.negate_source || p.target_ad_group_id.is_some(),
                    "negateSource requires targetAdGroupId",
                )
            }
            RuleParams::SearchTermPrune(p) => {
                ensure_window(p.window_days, "windowDays")?;
                ensure(p.min_clicks >= 1, "minClicks must be at least 1")?;
                ensure(p.min_spend >= 0.0, "minSpend must not be negative")?;
                ensure(p.max_convs >= 0, "maxConvs must not be negative")
            }
            RuleParams::BidDown(p) | RuleParams::BidUp(p) => {
                ensure_window(p.window_days, "windowDays")?;
                ensure(p.target_acos > 0.0, "targetAcos must be positive")?;
                ensure(p.min_clicks >= 0, "minClicks must not be negative")?;
                match p.max_impression_share {
                    Some(s) => ensure(
                        (0.0..=100.0).contains(&s),
                        "maxImpressionShare must be a percentage",
                    ),
                    None => Ok(()),
                }
            }
            RuleParams::PlacementOpt(p) => {
                ensure_window(p.window_days, "windowDays")?;
                ensure(p.target_acos > 0.0, "targetAcos must be positive")
            }
        }
    }
}

fn ensure(cond: bool, msg: &str) -> Result<(), DomainError> {
    if cond {
        Ok(())
    } else {
        Err(DomainError::Validation(msg.to_string()))
    }
}

fn ensure_window(days: u32, field: &str) -> Result<(), DomainError> {
    ensure(
        (1..=MAX_WINDOW_DAYS).contains(&days),
        &format!("{field} must be between 1 and {MAX_WINDOW_DAYS}"),
    )
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetDepletionParams {
    /// Pace, in percent of budget per percent of day, above which the campaign is flagged.
    #[serde(default = "default_percent_threshold")]
    pub percent_threshold: f64,
    #[serde(default = "default_before_hour")]
    pub before_hour_local: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpendSpikeParams {
    #[serde(default = "default_spike_lookback")]
    pub lookback_days: u32,
    #[serde(default = "default_stdev_multiplier")]
    pub stdev_multiplier: f64,
    #[serde(default = "default_spike_min_spend")]
    pub min_spend: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HarvestParams {
    #[serde(default = "default_term_window")]
    pub window_days: u32,
    #[serde(default = "default_min_convs")]
    pub min_convs: i64,
    #[serde(default = "default_target_acos")]
    pub max_acos: f64,
    /// Also add a negative exact match in the source ad group. Needs
    /// `targetAdGroupId`; terms already in the target ad group are not negated.
    #[serde(default)]
    pub negate_source: bool,
    /// Destination for harvested keywords; defaults to the source ad group.
    #[serde(default)]
    pub target_campaign_id: Option<String>,
    #[serde(default)]
    pub target_ad_group_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PruneParams {
    #[serde(default = "default_term_window")]
    pub window_days: u32,
    #[serde(default = "default_prune_min_clicks")]
    pub min_clicks: i64,
    #[serde(default = "default_prune_min_spend")]
    pub min_spend: f64,
    #[serde(default)]
    pub max_convs: i64,
    #[serde(default)]
    pub negate_scope: NegateScope,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BidAdjustParams {
    #[serde(default = "default_bid_window")]
    pub window_days: u32,
    #[serde(default = "default_bid_min_clicks")]
    pub min_clicks: i64,
    #[serde(default = "default_target_acos")]
    pub target_acos: f64,
    /// Orders needed before a bid is raised.
    #[serde(default = "default_min_convs")]
    pub min_orders: i64,
    /// Bid-up only fires while impression share is below this percentage.
    #[serde(default)]
    pub max_impression_share: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacementParams {
    #[serde(default = "default_bid_window")]
    pub window_days: u32,
    #[serde(default = "default_prune_min_clicks")]
    pub min_clicks: i64,
    #[serde(default = "default_target_acos")]
    pub target_acos: f64,
}

fn default_percent_threshold() -> f64 {
    80.0
}
fn default_before_hour() -> u32 {
    18
}
fn default_spike_lookback() -> u32 {
    7
}
fn default_stdev_multiplier() -> f64 {
    2.0
}
fn default_spike_min_spend() -> f64 {
    5.0
}
fn default_term_window() -> u32 {
    30
}
fn default_min_convs() -> i64 {
    2
}
fn default_target_acos() -> f64 {
    30.0
}
fn default_prune_min_clicks() -> i64 {
    20
}
fn default_prune_min_spend() -> f64 {
    10.0
}
fn default_bid_window() -> u32 {
    14
}
fn default_bid_min_clicks() -> i64 {
    10
}

/// What a matched rule proposes to do.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum RuleAction {
    AlertOnly,
    PauseCampaign,
    RaiseBudget {
        percent: f64,
        #[serde(default)]
        max_budget: Option<f64>,
    },
    AdjustBid {
        percent: f64,
        #[serde(default)]
        min_bid: Option<f64>,
        #[serde(default)]
        max_bid: Option<f64>,
    },
    CreateKeyword {
        #[serde(default)]
        bid: Option<f64>,
    },
    NegativeKeyword {
        #[serde(default = "default_negative_match")]
        match_type: MatchType,
    },
    AdjustPlacement {
        step_percent: i32,
        max_percent: i32,
    },
}

fn default_negative_match() -> MatchType {
    MatchType::NegativeExact
}

impl RuleAction {
    pub fn name(&self) -> &'static str {
        match self {
            RuleAction::AlertOnly => "alert_only",
            RuleAction::PauseCampaign => "pause_campaign",
            RuleAction::RaiseBudget { .. } => "raise_budget",
            RuleAction::AdjustBid { .. } => "adjust_bid",
            RuleAction::CreateKeyword { .. } => "create_keyword",
            RuleAction::NegativeKeyword { .. } => "negative_keyword",
            RuleAction::AdjustPlacement { .. } => "adjust_placement",
        }
    }

    pub fn validate_for(&self, rule_type: RuleType) -> Result<(), DomainError> {
        let compatible = match (rule_type, self) {
            (_, RuleAction::AlertOnly) => true,
            (RuleType::BudgetDepletion, RuleAction::RaiseBudget { .. }) => true,
            (RuleType::SpendSpike, RuleAction::PauseCampaign) => true,
            (RuleType::SearchTermHarvest, RuleAction::CreateKeyword { .. }) => true,
            (RuleType::SearchTermPrune, RuleAction::NegativeKeyword { .. }) => true,
            (RuleType::BidDown | RuleType::BidUp, RuleAction::AdjustBid { .. }) => true,
            (RuleType::PlacementOpt, RuleAction::AdjustPlacement { .. }) => true,
            _ => false,
        };
        if !compatible {
            return Err(DomainError::Validation(format!(
                "action '{}' is not available for rule type '{}'",
                self.name(),
                rule_type
            )));
        }
        match self {
            RuleAction::RaiseBudget { percent, max_budget } => {
                ensure(*percent > 0.0, "raise_budget percent must be positive")?;
                ensure(
                    max_budget.map_or(true, |m| m > 0.0),
                    "raise_budget maxBudget must be positive",
                )
            }
            RuleAction::AdjustBid { percent, min_bid, max_bid } => {
                ensure(
                    *percent > 0.0 && *percent < 100.0,
                    "adjust_bid percent must be between 0 and 100",
                )?;
                if let (Some(lo), Some(hi)) = (min_bid, max_bid) {
                    ensure(lo <= hi, "adjust_bid minBid must not exceed maxBid")?;
                }
                Ok(())
            }
            RuleAction::CreateKeyword { bid } => {
                ensure(bid.map_or(true, |b| b > 0.0), "create_keyword bid must be positive")
            }
            RuleAction::NegativeKeyword { match_type } => ensure(
                match_type.is_negative(),
                "negative_keyword requires a negative match type",
            ),
            RuleAction::AdjustPlacement { step_percent, max_percent } => {
                ensure(*step_percent > 0, "adjust_placement stepPercent must be positive")?;
                ensure(
                    (0..=900).contains(max_percent),
                    "adjust_placement maxPercent must be between 0 and 900",
                )
            }
            RuleAction::AlertOnly | RuleAction::PauseCampaign => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThrottlePolicy {
    #[serde(default = "default_cooldown_hours")]
    pub cooldown_hours: u32,
    #[serde(default = "default_max_actions_per_day")]
    pub max_actions_per_day: u32,
}

impl Default for ThrottlePolicy {
    fn default() -> Self {
        Self {
            cooldown_hours: default_cooldown_hours(),
            max_actions_per_day: default_max_actions_per_day(),
        }
    }
}

impl ThrottlePolicy {
    fn validate(&self) -> Result<(), DomainError> {
        ensure(self.max_actions_per_day >= 1, "maxActionsPerDay must be at least 1")?;
        ensure(self.cooldown_hours <= 24 * 30, "cooldownHours must be at most 720")
    }
}

fn default_cooldown_hours() -> u32 {
    0
}
fn default_max_actions_per_day() -> u32 {
    25
}
