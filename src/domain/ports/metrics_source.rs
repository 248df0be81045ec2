//! Read side of the performance metrics store.
//!
//! Ingestion is owned by the reporting pipeline; automation only reads. Every
//! method answers with zeros or an empty list when no data exists in range.

use crate::domain::error::DomainError;
use crate::domain::values::entity_type::EntityRef;
use crate::domain::values::metrics::EntityMetrics;
use crate::domain::values::targeting::Placement;
use crate::domain::values::time_range::DateRange;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignSnapshot {
    pub campaign_id: String,
    pub name: String,
    pub enabled: bool,
    pub daily_budget: f64,
    /// Spend so far on the requested profile-local day.
    pub spend_today: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DailySpend {
    pub date: NaiveDate,
    pub spend: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchTermStats {
    pub campaign_id: String,
    pub ad_group_id: String,
    pub search_term: String,
    pub metrics: EntityMetrics,
    /// Already a keyword somewhere in the profile.
    pub already_targeted: bool,
    /// Already blocked by a negative keyword in the same campaign.
    #[serde(default)]
    pub already_negated: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetStats {
    /// A keyword or a product target.
    pub entity: EntityRef,
    pub campaign_id: String,
    pub ad_group_id: String,
    pub text: Option<String>,
    pub bid: f64,
    pub metrics: EntityMetrics,
    /// Percentage of eligible impressions won, when reported.
    pub impression_share: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlacementStats {
    pub campaign_id: String,
    pub placement: Placement,
    /// Current bid adjustment in percent.
    pub percentage: i32,
    pub metrics: EntityMetrics,
}

pub trait MetricsSource: Send + Sync {
    fn entity_metrics(
        &self,
        profile_id: &str,
        entity: &EntityRef,
        range: &DateRange,
    ) -> Result<EntityMetrics, DomainError>;

    /// Enabled and paused campaigns with their spend on `day`.
    fn campaigns(&self, profile_id: &str, day: NaiveDate) -> Result<Vec<CampaignSnapshot>, DomainError>;

    /// One entry per date in range; dates without data carry zero spend.
    fn daily_spend(
        &self,
        profile_id: &str,
        campaign_id: &str,
        range: &DateRange,
    ) -> Result<Vec<DailySpend>, DomainError>;

    fn search_terms(&self, profile_id: &str, range: &DateRange) -> Result<Vec<SearchTermStats>, DomainError>;
    fn targets(&self, profile_id: &str, range: &DateRange) -> Result<Vec<TargetStats>, DomainError>;
    fn placements(&self, profile_id: &str, range: &DateRange) -> Result<Vec<PlacementStats>, DomainError>;
}
