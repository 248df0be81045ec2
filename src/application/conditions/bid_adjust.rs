use serde_json::json;

use super::search_terms::MIN_BID;
use super::{params_mismatch, round_cents, ConditionContext, ConditionMatch, ConditionOutput, RuleCondition};
use crate::domain::entities::automation_rule::{BidAdjustParams, RuleAction, RuleParams};
use crate::domain::entities::queued_action::ActionPayload;
use crate::domain::error::DomainError;
use crate::domain::ports::metrics_source::TargetStats;
use crate::domain::values::action_type::ActionType;
use crate::domain::values::entity_type::{EntityRef, EntityType};
use crate::domain::values::metrics::to_micros;
use crate::domain::values::rule_type::RuleType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BidDirection {
    Down,
    Up,
}

/// Lowers bids on targets over the ACoS target, or raises them on efficient
/// targets that still have impression share to win.
pub struct BidAdjust {
    direction: BidDirection,
}

impl BidAdjust {
    pub fn down() -> Self {
        Self {
            direction: BidDirection::Down,
        }
    }

    pub fn up() -> Self {
        Self {
            direction: BidDirection::Up,
        }
    }

    fn triggers(&self, p: &BidAdjustParams, t: &TargetStats) -> bool {
        let m = &t.metrics;
        if m.clicks < p.min_clicks {
            return false;
        }
        match self.direction {
            // Clicks without a sale count as over target.
            BidDirection::Down => m.acos().map_or(m.spend > 0.0, |acos| acos > p.target_acos),
            BidDirection::Up => {
                let efficient = m.orders >= p.min_orders && m.acos().is_some_and(|acos| acos <= p.target_acos);
                let room = match (p.max_impression_share, t.impression_share) {
                    (Some(max), Some(share)) => share < max,
                    _ => true,
                };
                efficient && room
            }
        }
    }
}

/// New bid after a percentage step, clamped to the floor and optional bounds.
pub fn adjusted_bid(bid: f64, percent: f64, direction: BidDirection, min_bid: Option<f64>, max_bid: Option<f64>) -> f64 {
    let factor = match direction {
        BidDirection::Down => 1.0 - percent / 100.0,
        BidDirection::Up => 1.0 + percent / 100.0,
    };
    let mut next = round_cents(bid * factor).max(min_bid.unwrap_or(MIN_BID).max(MIN_BID));
    if let Some(cap) = max_bid {
        next = next.min(cap);
    }
    next
}

impl RuleCondition for BidAdjust {
    fn rule_type(&self) -> RuleType {
        match self.direction {
            BidDirection::Down => RuleType::BidDown,
            BidDirection::Up => RuleType::BidUp,
        }
    }

    fn evaluate(&self, ctx: &ConditionContext) -> Result<ConditionOutput, DomainError> {
        let p = match (&ctx.rule.params, self.direction) {
            (RuleParams::BidDown(p), BidDirection::Down) | (RuleParams::BidUp(p), BidDirection::Up) => p,
            _ => return Err(params_mismatch(self.rule_type(), ctx.rule)),
        };
        let mut out = ConditionOutput::default();
        let targets = ctx.metrics.targets(&ctx.rule.profile_id, &ctx.report_range())?;

        for t in &targets {
            out.evaluated += 1;
            if !self.triggers(p, t) {
                continue;
            }

            let mut changes = Vec::new();
            if let RuleAction::AdjustBid { percent, min_bid, max_bid } = &ctx.rule.action {
                let next = adjusted_bid(t.bid, *percent, self.direction, *min_bid, *max_bid);
                let moved = match self.direction {
                    BidDirection::Down => next < t.bid,
                    BidDirection::Up => next > t.bid,
                };
                if !moved {
                    continue;
                }
                let (keyword_id, target_id) = match t.entity.entity_type {
                    EntityType::Keyword => (Some(t.entity.entity_id.clone()), None),
                    _ => (None, Some(t.entity.entity_id.clone())),
                };
                changes.push((
                    ActionType::SetBid,
                    ActionPayload {
                        campaign_id: Some(t.campaign_id.clone()),
                        ad_group_id: Some(t.ad_group_id.clone()),
                        keyword_id,
                        target_id,
                        bid_micros: Some(to_micros(next)),
                        previous_bid_micros: Some(to_micros(t.bid)),
                        reason: Some(format!("{}: bid {:.2} -> {next:.2}", self.rule_type(), t.bid)),
                        ..Default::default()
                    },
                ));
            }

            let acos = t.metrics.acos();
            out.matches.push(ConditionMatch {
                match_key: t.entity.to_string(),
                entity: t.entity.clone(),
                lineage: vec![
                    EntityRef::campaign(t.campaign_id.clone()),
                    EntityRef::ad_group(t.ad_group_id.clone()),
                    t.entity.clone(),
                ],
                message: format!(
                    "{} '{}' at bid {:.2}: ACoS {} vs target {:.1}% over {} clicks",
                    t.entity.entity_type,
                    t.text.as_deref().unwrap_or(&t.entity.entity_id),
                    t.bid,
                    acos.map_or_else(|| "n/a".to_string(), |a| format!("{a:.1}%")),
                    p.target_acos,
                    t.metrics.clicks
                ),
                snapshot: json!({
                    "bid": t.bid,
                    "impression_share": t.impression_share,
                    "metrics": t.metrics.snapshot(),
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
    use crate::domain::values::metrics::EntityMetrics;
    use chrono::{TimeZone, Utc};

    fn params() -> BidAdjustParams {
        BidAdjustParams {
            window_days: 14,
            min_clicks: 10,
            target_acos: 30.0,
            min_orders: 2,
            max_impression_share: Some(50.0),
        }
    }

    fn target(id: &str, bid: f64, metrics: EntityMetrics, share: Option<f64>) -> TargetStats {
        TargetStats {
            entity: EntityRef::new(EntityType::Keyword, id),
            campaign_id: "c1".into(),
            ad_group_id: "ag1".into(),
            text: Some(format!("kw {id}")),
            bid,
            metrics,
            impression_share: share,
        }
    }

    #[test]
    fn test_adjusted_bid_respects_floor_and_cap() {
        assert_eq!(adjusted_bid(1.00, 20.0, BidDirection::Down, None, None), 0.80);
        assert_eq!(adjusted_bid(0.02, 50.0, BidDirection::Down, None, None), 0.02);
        assert_eq!(adjusted_bid(1.00, 50.0, BidDirection::Up, None, Some(1.25)), 1.25);
    }

    #[test]
    fn test_bid_down_on_expensive_and_unconverting_targets() {
        let r = rule(
            RuleParams::BidDown(params()),
            RuleAction::AdjustBid { percent: 20.0, min_bid: None, max_bid: None },
        );
        let metrics = StaticMetrics {
            targets: vec![
                target("k1", 1.0, EntityMetrics { spend: 50.0, clicks: 50, sales: 100.0, orders: 2, ..Default::default() }, None),
                target("k2", 1.0, EntityMetrics { spend: 15.0, clicks: 15, ..Default::default() }, None),
                target("k3", 1.0, EntityMetrics { spend: 10.0, clicks: 20, sales: 100.0, orders: 5, ..Default::default() }, None),
            ],
            ..Default::default()
        };
        let now = Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap();
        let ctx = ConditionContext::new(&r, window(&r, now), &metrics);
        let out = BidAdjust::down().evaluate(&ctx).unwrap();

        let ids: Vec<_> = out.matches.iter().map(|m| m.entity.entity_id.as_str()).collect();
        assert_eq!(ids, vec!["k1", "k2"]);
        let payload = &out.matches[0].changes[0].1;
        assert_eq!(payload.keyword_id.as_deref(), Some("k1"));
        assert_eq!(payload.bid_micros, Some(800_000));
        assert_eq!(payload.previous_bid_micros, Some(1_000_000));
    }

    #[test]
    fn test_bid_up_needs_impression_share_headroom() {
        let r = rule(
            RuleParams::BidUp(params()),
            RuleAction::AdjustBid { percent: 10.0, min_bid: None, max_bid: Some(2.0) },
        );
        let efficient = EntityMetrics { spend: 10.0, clicks: 20, sales: 100.0, orders: 5, ..Default::default() };
        let metrics = StaticMetrics {
            targets: vec![
                target("k1", 1.0, efficient, Some(20.0)),
                target("k2", 1.0, efficient, Some(80.0)),
            ],
            ..Default::default()
        };
        let now = Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap();
        let ctx = ConditionContext::new(&r, window(&r, now), &metrics);
        let out = BidAdjust::up().evaluate(&ctx).unwrap();

        assert_eq!(out.matches.len(), 1);
        assert_eq!(out.matches[0].changes[0].1.bid_micros, Some(1_100_000));
    }
}
