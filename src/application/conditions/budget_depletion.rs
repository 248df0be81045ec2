use serde_json::json;

use super::{params_mismatch, round_cents, ConditionContext, ConditionMatch, ConditionOutput, RuleCondition};
use crate::domain::entities::automation_rule::{RuleAction, RuleParams};
use crate::domain::entities::queued_action::ActionPayload;
use crate::domain::error::DomainError;
use crate::domain::ports::metrics_source::CampaignSnapshot;
use crate::domain::values::action_type::ActionType;
use crate::domain::values::entity_type::EntityRef;
use crate::domain::values::metrics::to_micros;
use crate::domain::values::rule_type::RuleType;

/// Flags campaigns burning through their daily budget faster than the day
/// is passing.
pub struct BudgetDepletion;

/// Budget consumed, in percent, divided by the share of the day elapsed.
pub fn pace_percent(spend_today: f64, daily_budget: f64, elapsed_day_fraction: f64) -> f64 {
    (spend_today / daily_budget * 100.0) / elapsed_day_fraction
}

fn raised_budget(c: &CampaignSnapshot, percent: f64, max_budget: Option<f64>) -> Option<ActionPayload> {
    let mut proposed = round_cents(c.daily_budget * (1.0 + percent / 100.0));
    if let Some(cap) = max_budget {
        proposed = proposed.min(cap);
    }
    if proposed <= c.daily_budget {
        return None;
    }
    Some(ActionPayload {
        campaign_id: Some(c.campaign_id.clone()),
        budget_micros: Some(to_micros(proposed)),
        previous_budget_micros: Some(to_micros(c.daily_budget)),
        reason: Some(format!("budget pacing: raise {:.2} -> {proposed:.2}", c.daily_budget)),
        ..Default::default()
    })
}

impl RuleCondition for BudgetDepletion {
    fn rule_type(&self) -> RuleType {
        RuleType::BudgetDepletion
    }

    fn evaluate(&self, ctx: &ConditionContext) -> Result<ConditionOutput, DomainError> {
        let RuleParams::BudgetDepletion(p) = &ctx.rule.params else {
            return Err(params_mismatch(self.rule_type(), ctx.rule));
        };
        let mut out = ConditionOutput::default();

        let now = ctx.now();
        if ctx.clock.local_hour(now) >= p.before_hour_local {
            return Ok(out);
        }
        let elapsed = ctx.clock.elapsed_day_fraction(now);

        let campaigns = ctx.metrics.campaigns(&ctx.rule.profile_id, ctx.today())?;
        for c in campaigns.iter().filter(|c| c.enabled && c.daily_budget > 0.0) {
            out.evaluated += 1;
            let pace = pace_percent(c.spend_today, c.daily_budget, elapsed);
            if pace <= p.percent_threshold {
                continue;
            }

            let changes = match &ctx.rule.action {
                RuleAction::RaiseBudget { percent, max_budget } => raised_budget(c, *percent, *max_budget)
                    .map(|payload| vec![(ActionType::SetCampaignBudget, payload)])
                    .unwrap_or_default(),
                _ => Vec::new(),
            };
            let entity = EntityRef::campaign(c.campaign_id.clone());
            out.matches.push(ConditionMatch {
                match_key: c.campaign_id.clone(),
                lineage: vec![entity.clone()],
                entity,
                message: format!(
                    "Campaign '{}' has spent {:.0}% of its {:.2} daily budget with {:.0}% of the day elapsed (pace {pace:.0}% > {:.0}%)",
                    c.name,
                    c.spend_today / c.daily_budget * 100.0,
                    c.daily_budget,
                    elapsed * 100.0,
                    p.percent_threshold
                ),
                snapshot: json!({
                    "daily_budget": c.daily_budget,
                    "spend_today": c.spend_today,
                    "elapsed_day_fraction": elapsed,
                    "pace_percent": pace,
                }),
                changes,
            });
        }
        Ok(out)
    }
}
