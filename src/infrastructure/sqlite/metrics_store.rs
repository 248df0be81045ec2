//! Reporting tables the rule conditions read from, plus the ingestion
//! helpers the import command uses to fill them.

use super::{db_err, enum_col, lock, SharedConnection};
use crate::domain::error::DomainError;
use crate::domain::ports::metrics_source::*;
use crate::domain::values::entity_type::EntityRef;
use crate::domain::values::metrics::EntityMetrics;
use crate::domain::values::targeting::{MatchType, Placement};
use crate::domain::values::time_range::DateRange;
use chrono::NaiveDate;
use rusqlite::params;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub struct SqliteMetricsStore {
    conn: SharedConnection,
}

/// Bulk metrics document accepted by `import`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsImport {
    pub profile_id: String,
    pub campaigns: Vec<CampaignRecord>,
    pub entity_days: Vec<EntityDayRecord>,
    pub search_terms: Vec<SearchTermDayRecord>,
    pub targets: Vec<TargetRecord>,
    pub placement_days: Vec<PlacementDayRecord>,
    pub placement_settings: Vec<PlacementSettingRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignRecord {
    pub campaign_id: String,
    pub name: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub daily_budget: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityDayRecord {
    pub entity: EntityRef,
    pub date: NaiveDate,
    #[serde(flatten)]
    pub metrics: EntityMetrics,
    #[serde(default)]
    pub impression_share: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchTermDayRecord {
    pub campaign_id: String,
    pub ad_group_id: String,
    pub search_term: String,
    pub date: NaiveDate,
    #[serde(flatten)]
    pub metrics: EntityMetrics,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetRecord {
    pub entity: EntityRef,
    pub campaign_id: String,
    pub ad_group_id: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub match_type: Option<MatchType>,
    pub bid: f64,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlacementDayRecord {
    pub campaign_id: String,
    pub placement: Placement,
    pub date: NaiveDate,
    #[serde(flatten)]
    pub metrics: EntityMetrics,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlacementSettingRecord {
    pub campaign_id: String,
    pub placement: Placement,
    pub percentage: i32,
}

fn default_true() -> bool {
    true
}

/// Rows written per section by one import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportCounts {
    pub campaigns: usize,
    pub entity_days: usize,
    pub search_terms: usize,
    pub targets: usize,
    pub placement_days: usize,
    pub placement_settings: usize,
}

fn metrics_from_row(row: &rusqlite::Row, first: usize) -> Result<EntityMetrics, rusqlite::Error> {
    Ok(EntityMetrics {
        spend: row.get(first)?,
        clicks: row.get(first + 1)?,
        impressions: row.get(first + 2)?,
        sales: row.get(first + 3)?,
        orders: row.get(first + 4)?,
    })
}

impl SqliteMetricsStore {
    pub fn new(conn: SharedConnection) -> Self {
        Self { conn }
    }

    pub fn record_campaign(&self, profile_id: &str, c: &CampaignRecord) -> Result<(), DomainError> {
        let conn = lock(&self.conn)?;
        conn.execute(
            "INSERT INTO campaigns (profile_id, campaign_id, name, state, daily_budget)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(profile_id, campaign_id) DO UPDATE SET
               name = excluded.name, state = excluded.state, daily_budget = excluded.daily_budget",
            params![
                profile_id,
                c.campaign_id,
                c.name,
                if c.enabled { "enabled" } else { "paused" },
                c.daily_budget
            ],
        )
        .map_err(db_err("Failed to record campaign"))?;
        Ok(())
    }

    pub fn record_entity_day(&self, profile_id: &str, r: &EntityDayRecord) -> Result<(), DomainError> {
        let conn = lock(&self.conn)?;
        let m = &r.metrics;
        conn.execute(
            "INSERT OR REPLACE INTO entity_daily_metrics
             (profile_id, entity_type, entity_id, date, spend, clicks, impressions, sales, orders, impression_share)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                profile_id,
                r.entity.entity_type.to_string(),
                r.entity.entity_id,
                r.date.to_string(),
                m.spend,
                m.clicks,
                m.impressions,
                m.sales,
                m.orders,
                r.impression_share,
            ],
        )
        .map_err(db_err("Failed to record entity metrics"))?;
        Ok(())
    }

    pub fn record_search_term_day(&self, profile_id: &str, r: &SearchTermDayRecord) -> Result<(), DomainError> {
        let conn = lock(&self.conn)?;
        let m = &r.metrics;
        conn.execute(
            "INSERT OR REPLACE INTO search_term_daily
             (profile_id, campaign_id, ad_group_id, search_term, date, spend, clicks, impressions, sales, orders)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                profile_id,
                r.campaign_id,
                r.ad_group_id,
                r.search_term.trim().to_lowercase(),
                r.date.to_string(),
                m.spend,
                m.clicks,
                m.impressions,
                m.sales,
                m.orders,
            ],
        )
        .map_err(db_err("Failed to record search term metrics"))?;
        Ok(())
    }

    pub fn record_target(&self, profile_id: &str, r: &TargetRecord) -> Result<(), DomainError> {
        let conn = lock(&self.conn)?;
        conn.execute(
            "INSERT INTO targets (profile_id, entity_type, entity_id, campaign_id, ad_group_id, text, match_type, bid, state)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(profile_id, entity_type, entity_id) DO UPDATE SET
               campaign_id = excluded.campaign_id, ad_group_id = excluded.ad_group_id, text = excluded.text,
               match_type = excluded.match_type, bid = excluded.bid, state = excluded.state",
            params![
                profile_id,
                r.entity.entity_type.to_string(),
                r.entity.entity_id,
                r.campaign_id,
                r.ad_group_id,
                r.text.as_deref().map(|t| t.trim().to_lowercase()),
                r.match_type.map(|m| m.to_string()),
                r.bid,
                if r.enabled { "enabled" } else { "paused" },
            ],
        )
        .map_err(db_err("Failed to record target"))?;
        Ok(())
    }

    pub fn record_placement_day(&self, profile_id: &str, r: &PlacementDayRecord) -> Result<(), DomainError> {
        let conn = lock(&self.conn)?;
        let m = &r.metrics;
        conn.execute(
            "INSERT OR REPLACE INTO placement_daily
             (profile_id, campaign_id, placement, date, spend, clicks, impressions, sales, orders)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                profile_id,
                r.campaign_id,
                r.placement.to_string(),
                r.date.to_string(),
                m.spend,
                m.clicks,
                m.impressions,
                m.sales,
                m.orders,
            ],
        )
        .map_err(db_err("Failed to record placement metrics"))?;
        Ok(())
    }

    pub fn set_placement(&self, profile_id: &str, r: &PlacementSettingRecord) -> Result<(), DomainError> {
        let conn = lock(&self.conn)?;
        conn.execute(
            "INSERT OR REPLACE INTO placement_settings (profile_id, campaign_id, placement, percentage)
             VALUES (?1, ?2, ?3, ?4)",
            params![profile_id, r.campaign_id, r.placement.to_string(), r.percentage],
        )
        .map_err(db_err("Failed to set placement adjustment"))?;
        Ok(())
    }

    /// Upsert every section of an import document.
    pub fn import(&self, doc: &MetricsImport) -> Result<ImportCounts, DomainError> {
        if doc.profile_id.trim().is_empty() {
            return Err(DomainError::Validation("import requires a profile_id".into()));
        }
        let p = doc.profile_id.as_str();
        for c in &doc.campaigns {
            self.record_campaign(p, c)?;
        }
        for r in &doc.entity_days {
            self.record_entity_day(p, r)?;
        }
        for r in &doc.search_terms {
            self.record_search_term_day(p, r)?;
        }
        for r in &doc.targets {
            self.record_target(p, r)?;
        }
        for r in &doc.placement_days {
            self.record_placement_day(p, r)?;
        }
        for r in &doc.placement_settings {
            self.set_placement(p, r)?;
        }
        Ok(ImportCounts {
            campaigns: doc.campaigns.len(),
            entity_days: doc.entity_days.len(),
            search_terms: doc.search_terms.len(),
            targets: doc.targets.len(),
            placement_days: doc.placement_days.len(),
            placement_settings: doc.placement_settings.len(),
        })
    }
}

impl MetricsSource for SqliteMetricsStore {
    fn entity_metrics(
        &self,
        profile_id: &str,
        entity: &EntityRef,
        range: &DateRange,
    ) -> Result<EntityMetrics, DomainError> {
        let conn = lock(&self.conn)?;
        conn.query_row(
            "SELECT COALESCE(SUM(spend), 0), COALESCE(SUM(clicks), 0), COALESCE(SUM(impressions), 0),
                    COALESCE(SUM(sales), 0), COALESCE(SUM(orders), 0)
             FROM entity_daily_metrics
             WHERE profile_id = ?1 AND entity_type = ?2 AND entity_id = ?3 AND date BETWEEN ?4 AND ?5",
            params![
                profile_id,
                entity.entity_type.to_string(),
                entity.entity_id,
                range.from.to_string(),
                range.to.to_string(),
            ],
            |row| metrics_from_row(row, 0),
        )
        .map_err(db_err("Failed to sum entity metrics"))
    }

    fn campaigns(&self, profile_id: &str, day: NaiveDate) -> Result<Vec<CampaignSnapshot>, DomainError> {
        let conn = lock(&self.conn)?;
        let mut stmt = conn
            .prepare(
                "SELECT c.campaign_id, c.name, c.state, c.daily_budget, COALESCE(m.spend, 0)
                 FROM campaigns c
                 LEFT JOIN entity_daily_metrics m
                   ON m.profile_id = c.profile_id AND m.entity_type = 'campaign'
                  AND m.entity_id = c.campaign_id AND m.date = ?2
                 WHERE c.profile_id = ?1 AND c.state != 'archived'
                 ORDER BY c.campaign_id",
            )
            .map_err(db_err("Failed to prepare campaign snapshot"))?;
        let campaigns = stmt
            .query_map(params![profile_id, day.to_string()], |row| {
                let state: String = row.get(2)?;
                Ok(CampaignSnapshot {
                    campaign_id: row.get(0)?,
                    name: row.get(1)?,
                    enabled: state == "enabled",
                    daily_budget: row.get(3)?,
                    spend_today: row.get(4)?,
                })
            })
            .map_err(db_err("Failed to load campaigns"))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(db_err("Failed to decode campaign"))?;
        Ok(campaigns)
    }

    fn daily_spend(
        &self,
        profile_id: &str,
        campaign_id: &str,
        range: &DateRange,
    ) -> Result<Vec<DailySpend>, DomainError> {
        let conn = lock(&self.conn)?;
        let mut stmt = conn
            .prepare(
                "SELECT date, spend FROM entity_daily_metrics
                 WHERE profile_id = ?1 AND entity_type = 'campaign' AND entity_id = ?2
                   AND date BETWEEN ?3 AND ?4",
            )
            .map_err(db_err("Failed to prepare daily spend"))?;
        let by_date: HashMap<String, f64> = stmt
            .query_map(
                params![profile_id, campaign_id, range.from.to_string(), range.to.to_string()],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?)),
            )
            .map_err(db_err("Failed to load daily spend"))?
            .collect::<Result<HashMap<_, _>, _>>()
            .map_err(db_err("Failed to decode daily spend"))?;

        Ok(range
            .dates()
            .map(|date| DailySpend {
                date,
                spend: by_date.get(&date.to_string()).copied().unwrap_or(0.0),
            })
            .collect())
    }

    fn search_terms(&self, profile_id: &str, range: &DateRange) -> Result<Vec<SearchTermStats>, DomainError> {
        let conn = lock(&self.conn)?;
        let mut stmt = conn
            .prepare(
                "SELECT s.campaign_id, s.ad_group_id, s.search_term,
                        SUM(s.spend), SUM(s.clicks), SUM(s.impressions), SUM(s.sales), SUM(s.orders),
                        EXISTS (SELECT 1 FROM targets t
                                WHERE t.profile_id = s.profile_id AND t.entity_type = 'keyword'
                                  AND t.text = s.search_term AND t.state != 'archived'
                                  AND (t.match_type IS NULL OR t.match_type NOT LIKE 'negative%')),
                        EXISTS (SELECT 1 FROM targets t
                                WHERE t.profile_id = s.profile_id AND t.entity_type = 'keyword'
                                  AND t.campaign_id = s.campaign_id
                                  AND t.text = s.search_term AND t.state != 'archived'
                                  AND t.match_type LIKE 'negative%')
                 FROM search_term_daily s
                 WHERE s.profile_id = ?1 AND s.date BETWEEN ?2 AND ?3
                 GROUP BY s.campaign_id, s.ad_group_id, s.search_term
                 ORDER BY SUM(s.spend) DESC",
            )
            .map_err(db_err("Failed to prepare search term report"))?;
        let terms = stmt
            .query_map(
                params![profile_id, range.from.to_string(), range.to.to_string()],
                |row| {
                    Ok(SearchTermStats {
                        campaign_id: row.get(0)?,
                        ad_group_id: row.get(1)?,
                        search_term: row.get(2)?,
                        metrics: metrics_from_row(row, 3)?,
                        already_targeted: row.get::<_, i64>(8)? != 0,
                        already_negated: row.get::<_, i64>(9)? != 0,
                    })
                },
            )
            .map_err(db_err("Failed to load search terms"))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(db_err("Failed to decode search term"))?;
        Ok(terms)
    }

    fn targets(&self, profile_id: &str, range: &DateRange) -> Result<Vec<TargetStats>, DomainError> {
        let conn = lock(&self.conn)?;
        let mut stmt = conn
            .prepare(
                "SELECT t.entity_type, t.entity_id, t.campaign_id, t.ad_group_id, t.text, t.bid,
                        COALESCE(SUM(m.spend), 0), COALESCE(SUM(m.clicks), 0), COALESCE(SUM(m.impressions), 0),
                        COALESCE(SUM(m.sales), 0), COALESCE(SUM(m.orders), 0), AVG(m.impression_share)
                 FROM targets t
                 LEFT JOIN entity_daily_metrics m
                   ON m.profile_id = t.profile_id AND m.entity_type = t.entity_type
                  AND m.entity_id = t.entity_id AND m.date BETWEEN ?2 AND ?3
                 WHERE t.profile_id = ?1 AND t.state = 'enabled'
                   AND (t.match_type IS NULL OR t.match_type NOT LIKE 'negative%')
                 GROUP BY t.entity_type, t.entity_id
                 ORDER BY t.entity_id",
            )
            .map_err(db_err("Failed to prepare target report"))?;
        let targets = stmt
            .query_map(
                params![profile_id, range.from.to_string(), range.to.to_string()],
                |row| {
                    let entity_type: String = row.get(0)?;
                    Ok(TargetStats {
                        entity: EntityRef::new(enum_col(0, &entity_type)?, row.get::<_, String>(1)?),
                        campaign_id: row.get(2)?,
                        ad_group_id: row.get(3)?,
                        text: row.get(4)?,
                        bid: row.get(5)?,
                        metrics: metrics_from_row(row, 6)?,
                        impression_share: row.get(11)?,
                    })
                },
            )
            .map_err(db_err("Failed to load targets"))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(db_err("Failed to decode target"))?;
        Ok(targets)
    }

    fn placements(&self, profile_id: &str, range: &DateRange) -> Result<Vec<PlacementStats>, DomainError> {
        let conn = lock(&self.conn)?;
        let mut stmt = conn
            .prepare(
                "SELECT p.campaign_id, p.placement, COALESCE(ps.percentage, 0),
                        SUM(p.spend), SUM(p.clicks), SUM(p.impressions), SUM(p.sales), SUM(p.orders)
                 FROM placement_daily p
                 LEFT JOIN placement_settings ps
                   ON ps.profile_id = p.profile_id AND ps.campaign_id = p.campaign_id
                  AND ps.placement = p.placement
                 WHERE p.profile_id = ?1 AND p.date BETWEEN ?2 AND ?3
                 GROUP BY p.campaign_id, p.placement
                 ORDER BY p.campaign_id, p.placement",
            )
            .map_err(db_err("Failed to prepare placement report"))?;
        let placements = stmt
            .query_map(
                params![profile_id, range.from.to_string(), range.to.to_string()],
                |row| {
                    let placement: String = row.get(1)?;
                    Ok(PlacementStats {
                        campaign_id: row.get(0)?,
                        placement: enum_col(1, &placement)?,
                        percentage: row.get(2)?,
                        metrics: metrics_from_row(row, 3)?,
                    })
                },
            )
            .map_err(db_err("Failed to load placements"))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(db_err("Failed to decode placement"))?;
        Ok(placements)
    }
}
