//! Search-term harvesting (promote converting terms to keywords) and pruning
//! (negate terms that spend without converting).

use serde_json::json;

use super::{params_mismatch, round_cents, ConditionContext, ConditionMatch, ConditionOutput, RuleCondition};
use crate::domain::entities::automation_rule::{RuleAction, RuleParams};
use crate::domain::entities::queued_action::ActionPayload;
use crate::domain::error::DomainError;
use crate::domain::ports::metrics_source::SearchTermStats;
use crate::domain::values::action_type::ActionType;
use crate::domain::values::entity_type::EntityRef;
use crate::domain::values::metrics::to_micros;
use crate::domain::values::rule_type::RuleType;
use crate::domain::values::targeting::{MatchType, NegateScope};

/// Lowest keyword bid the platform accepts.
pub const MIN_BID: f64 = 0.02;

pub struct SearchTermHarvest;
pub struct SearchTermPrune;

fn term_key(t: &SearchTermStats) -> String {
    format!("{}/{}", t.ad_group_id, t.search_term)
}

fn source_lineage(t: &SearchTermStats) -> Vec<EntityRef> {
    vec![
        EntityRef::campaign(t.campaign_id.clone()),
        EntityRef::ad_group(t.ad_group_id.clone()),
    ]
}

impl RuleCondition for SearchTermHarvest {
    fn rule_type(&self) -> RuleType {
        RuleType::SearchTermHarvest
    }

    fn evaluate(&self, ctx: &ConditionContext) -> Result<ConditionOutput, DomainError> {
        let RuleParams::SearchTermHarvest(p) = &ctx.rule.params else {
            return Err(params_mismatch(self.rule_type(), ctx.rule));
        };
        let mut out = ConditionOutput::default();
        let terms = ctx.metrics.search_terms(&ctx.rule.profile_id, &ctx.report_range())?;

        for t in &terms {
            out.evaluated += 1;
            if t.already_targeted || t.metrics.orders < p.min_convs {
                continue;
            }
            let Some(acos) = t.metrics.acos() else {
                continue;
            };
            if acos > p.max_acos {
                continue;
            }

            let dest_campaign = p.target_campaign_id.clone().unwrap_or_else(|| t.campaign_id.clone());
            let dest_ad_group = p.target_ad_group_id.clone().unwrap_or_else(|| t.ad_group_id.clone());
            let moves = dest_ad_group != t.ad_group_id;

            let mut lineage = source_lineage(t);
            if moves {
                lineage.push(EntityRef::campaign(dest_campaign.clone()));
                lineage.push(EntityRef::ad_group(dest_ad_group.clone()));
            }

            let mut changes = Vec::new();
            if let RuleAction::CreateKeyword { bid } = &ctx.rule.action {
                let bid = bid
                    .or_else(|| t.metrics.cpc())
                    .map(round_cents)
                    .unwrap_or(MIN_BID)
                    .max(MIN_BID);
                changes.push((
                    ActionType::CreateKeyword,
                    ActionPayload {
                        campaign_id: Some(dest_campaign),
                        ad_group_id: Some(dest_ad_group),
                        keyword_text: Some(t.search_term.clone()),
                        match_type: Some(MatchType::Exact),
                        bid_micros: Some(to_micros(bid)),
                        reason: Some(format!(
                            "harvest: {} orders at {acos:.1}% ACoS",
                            t.metrics.orders
                        )),
                        ..Default::default()
                    },
                ));
                // Negating in the destination ad group would block the new keyword.
                if p.negate_source && moves {
                    changes.push((
                        ActionType::NegativeKeyword,
                        ActionPayload {
                            campaign_id: Some(t.campaign_id.clone()),
                            ad_group_id: Some(t.ad_group_id.clone()),
                            keyword_text: Some(t.search_term.clone()),
                            match_type: Some(MatchType::NegativeExact),
                            reason: Some("harvest: negate at source".into()),
                            ..Default::default()
                        },
                    ));
                }
            }

            out.matches.push(ConditionMatch {
                match_key: term_key(t),
                entity: EntityRef::ad_group(t.ad_group_id.clone()),
                lineage,
                message: format!(
                    "Search term '{}' converted {} times at {acos:.1}% ACoS (max {:.1}%)",
                    t.search_term, t.metrics.orders, p.max_acos
                ),
                snapshot: json!({
                    "search_term": t.search_term,
                    "campaign_id": t.campaign_id,
                    "ad_group_id": t.ad_group_id,
                    "metrics": t.metrics.snapshot(),
                }),
                changes,
            });
        }
        Ok(out)
    }
}

impl RuleCondition for SearchTermPrune {
    fn rule_type(&self) -> RuleType {
        RuleType::SearchTermPrune
    }

    fn evaluate(&self, ctx: &ConditionContext) -> Result<ConditionOutput, DomainError> {
        let RuleParams::SearchTermPrune(p) = &ctx.rule.params else {
            return Err(params_mismatch(self.rule_type(), ctx.rule));
        };
        let mut out = ConditionOutput::default();
        let terms = ctx.metrics.search_terms(&ctx.rule.profile_id, &ctx.report_range())?;

        for t in &terms {
            out.evaluated += 1;
            let m = &t.metrics;
            if t.already_negated || m.clicks < p.min_clicks || m.spend < p.min_spend || m.orders > p.max_convs {
                continue;
            }

            let changes = match &ctx.rule.action {
                RuleAction::NegativeKeyword { match_type } => vec![(
                    ActionType::NegativeKeyword,
                    ActionPayload {
                        campaign_id: Some(t.campaign_id.clone()),
                        ad_group_id: match p.negate_scope {
                            NegateScope::AdGroup => Some(t.ad_group_id.clone()),
                            NegateScope::Campaign => None,
                        },
                        keyword_text: Some(t.search_term.clone()),
                        match_type: Some(*match_type),
                        reason: Some(format!(
                            "prune: {} clicks, {:.2} spend, {} orders",
                            m.clicks, m.spend, m.orders
                        )),
                        ..Default::default()
                    },
                )],
                _ => Vec::new(),
            };

            out.matches.push(ConditionMatch {
                match_key: term_key(t),
                entity: EntityRef::ad_group(t.ad_group_id.clone()),
                lineage: source_lineage(t),
                message: format!(
                    "Search term '{}' spent {:.2} over {} clicks with {} orders",
                    t.search_term, m.spend, m.clicks, m.orders
                ),
                snapshot: json!({
                    "search_term": t.search_term,
                    "campaign_id": t.campaign_id,
                    "ad_group_id": t.ad_group_id,
                    "negate_scope": p.negate_scope,
                    "metrics": m.snapshot(),
                }),
                changes,
            });
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::*;
    use crate::domain::entities::automation_rule::{HarvestParams, PruneParams};
    use crate::domain::values::metrics::EntityMetrics;
    use chrono::{TimeZone, Utc};

    fn term(text: &str, metrics: EntityMetrics) -> SearchTermStats {
        SearchTermStats {
            campaign_id: "c1".into(),
            ad_group_id: "ag1".into(),
            search_term: text.into(),
            metrics,
            already_targeted: false,
            already_negated: false,
        }
    }

    fn now() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_prune_matches_wasteful_term() {
        let r = rule(
            RuleParams::SearchTermPrune(PruneParams {
                window_days: 30,
                min_clicks: 20,
                min_spend: 10.0,
                max_convs: 0,
                negate_scope: NegateScope::Campaign,
            }),
            RuleAction::NegativeKeyword {
                match_type: MatchType::NegativeExact,
            },
        );
        let metrics = StaticMetrics {
            terms: vec![
                term("cheap widget", EntityMetrics { spend: 12.0, clicks: 25, ..Default::default() }),
                term("widget", EntityMetrics { spend: 30.0, clicks: 40, sales: 90.0, orders: 3, ..Default::default() }),
            ],
            ..Default::default()
        };
        let ctx = ConditionContext::new(&r, window(&r, now()), &metrics);
        let out = SearchTermPrune.evaluate(&ctx).unwrap();

        assert_eq!(out.evaluated, 2);
        assert_eq!(out.matches.len(), 1);
        let (action_type, payload) = &out.matches[0].changes[0];
        assert_eq!(*action_type, ActionType::NegativeKeyword);
        assert_eq!(payload.keyword_text.as_deref(), Some("cheap widget"));
        assert!(payload.ad_group_id.is_none());
        assert_eq!(out.matches[0].lineage[0], EntityRef::campaign("c1"));
    }

    #[test]
    fn test_harvest_skips_targeted_and_expensive_terms() {
        let r = rule(
            RuleParams::SearchTermHarvest(HarvestParams {
                window_days: 30,
                min_convs: 2,
                max_acos: 30.0,
                negate_source: true,
                target_campaign_id: Some("exact-c".into()),
                target_ad_group_id: Some("exact-ag".into()),
            }),
            RuleAction::CreateKeyword { bid: None },
        );
        let good = EntityMetrics { spend: 20.0, clicks: 40, sales: 100.0, orders: 4, ..Default::default() };
        let mut targeted = term("blue widget", good);
        targeted.already_targeted = true;
        let metrics = StaticMetrics {
            terms: vec![
                term("red widget", good),
                targeted,
                term("gold widget", EntityMetrics { spend: 80.0, clicks: 40, sales: 100.0, orders: 4, ..Default::default() }),
            ],
            ..Default::default()
        };
        let ctx = ConditionContext::new(&r, window(&r, now()), &metrics);
        let out = SearchTermHarvest.evaluate(&ctx).unwrap();

        assert_eq!(out.matches.len(), 1);
        let changes = &out.matches[0].changes;
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].1.ad_group_id.as_deref(), Some("exact-ag"));
        // cpc 0.50
        assert_eq!(changes[0].1.bid_micros, Some(500_000));
        assert_eq!(changes[1].0, ActionType::NegativeKeyword);
        assert_eq!(changes[1].1.ad_group_id.as_deref(), Some("ag1"));
    }
}
