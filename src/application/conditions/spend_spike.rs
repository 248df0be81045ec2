use chrono::Duration;
use serde_json::json;

use super::{params_mismatch, ConditionContext, ConditionMatch, ConditionOutput, RuleCondition};
use crate::domain::entities::automation_rule::{RuleAction, RuleParams};
use crate::domain::entities::queued_action::ActionPayload;
use crate::domain::error::DomainError;
use crate::domain::values::action_type::ActionType;
use crate::domain::values::entity_type::EntityRef;
use crate::domain::values::rule_type::RuleType;
use crate::domain::values::time_range::DateRange;

/// Flags campaigns whose spend today is far above their recent daily norm.
pub struct SpendSpike;

/// Mean and sample standard deviation of a spend history.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpendStats {
    pub mean: f64,
    pub stdev: f64,
}

impl SpendStats {
    /// `None` with fewer than two samples.
    pub fn from_samples(samples: &[f64]) -> Option<Self> {
        if samples.len() < 2 {
            return None;
        }
        let n = samples.len() as f64;
        let mean = samples.iter().sum::<f64>() / n;
        let var = samples.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / (n - 1.0);
        Some(Self {
            mean,
            stdev: var.sqrt(),
        })
    }

    pub fn threshold(&self, multiplier: f64) -> f64 {
        self.mean + multiplier * self.stdev
    }
}

impl RuleCondition for SpendSpike {
    fn rule_type(&self) -> RuleType {
        RuleType::SpendSpike
    }

    fn evaluate(&self, ctx: &ConditionContext) -> Result<ConditionOutput, DomainError> {
        let RuleParams::SpendSpike(p) = &ctx.rule.params else {
            return Err(params_mismatch(self.rule_type(), ctx.rule));
        };
        let mut out = ConditionOutput::default();
        let today = ctx.today();
        let history_range = DateRange::ending(today - Duration::days(1), p.lookback_days);

        let campaigns = ctx.metrics.campaigns(&ctx.rule.profile_id, today)?;
        for c in campaigns.iter().filter(|c| c.enabled) {
            out.evaluated += 1;
            let history: Vec<f64> = ctx
                .metrics
                .daily_spend(&ctx.rule.profile_id, &c.campaign_id, &history_range)?
                .into_iter()
                .map(|d| d.spend)
                .collect();
            let Some(stats) = SpendStats::from_samples(&history) else {
                continue;
            };
            let threshold = stats.threshold(p.stdev_multiplier);
            if c.spend_today <= threshold || c.spend_today < p.min_spend {
                continue;
            }

            let changes = match ctx.rule.action {
                RuleAction::PauseCampaign => vec![(
                    ActionType::PauseCampaign,
                    ActionPayload {
                        campaign_id: Some(c.campaign_id.clone()),
                        reason: Some(format!(
                            "spend spike: {:.2} today vs threshold {threshold:.2}",
                            c.spend_today
                        )),
                        ..Default::default()
                    },
                )],
                _ => Vec::new(),
            };
            let entity = EntityRef::campaign(c.campaign_id.clone());
            out.matches.push(ConditionMatch {
                match_key: c.campaign_id.clone(),
                lineage: vec![entity.clone()],
                entity,
                message: format!(
                    "Campaign '{}' spent {:.2} today, above {:.2} (mean {:.2} + {} x stdev {:.2})",
                    c.name, c.spend_today, threshold, stats.mean, p.stdev_multiplier, stats.stdev
                ),
                snapshot: json!({
                    "spend_today": c.spend_today,
                    "mean": stats.mean,
                    "stdev": stats.stdev,
                    "threshold": threshold,
                    "history": history,
                }),
                changes,
            });
        }
        Ok(out)
    }
}
