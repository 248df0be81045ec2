use serde_json::json;

use super::{params_mismatch, ConditionContext, ConditionMatch, ConditionOutput, RuleCondition};
use crate::domain::entities::automation_rule::{RuleAction, RuleParams};
use crate::domain::entities::queued_action::ActionPayload;
use crate::domain::error::DomainError;
use crate::domain::values::action_type::ActionType;
use crate::domain::values::entity_type::EntityRef;
use crate::domain::values::rule_type::RuleType;

/// Steps placement bid adjustments toward placements that convert under the
/// ACoS target and away from ones that don't.
pub struct PlacementOpt;

pub fn stepped_percentage(current: i32, efficient: bool, step: i32, max: i32) -> i32 {
    if efficient {
        if current >= max {
            current
        } else {
            (current + step).min(max)
        }
    } else {
        (current - step).max(0)
    }
}

impl RuleCondition for PlacementOpt {
    fn rule_type(&self) -> RuleType {
        RuleType::PlacementOpt
    }

    fn evaluate(&self, ctx: &ConditionContext) -> Result<ConditionOutput, DomainError> {
        let RuleParams::PlacementOpt(p) = &ctx.rule.params else {
            return Err(params_mismatch(self.rule_type(), ctx.rule));
        };
        let mut out = ConditionOutput::default();
        let placements = ctx.metrics.placements(&ctx.rule.profile_id, &ctx.report_range())?;

        for s in &placements {
            out.evaluated += 1;
            if s.metrics.clicks < p.min_clicks {
                continue;
            }
            let acos = s.metrics.acos();
            let efficient = acos.is_some_and(|a| a <= p.target_acos);

            let changes = match &ctx.rule.action {
                RuleAction::AdjustPlacement { step_percent, max_percent } => {
                    let next = stepped_percentage(s.percentage, efficient, *step_percent, *max_percent);
                    if next == s.percentage {
                        continue;
                    }
                    vec![(
                        ActionType::SetPlacementAdjust,
                        ActionPayload {
                            campaign_id: Some(s.campaign_id.clone()),
                            placement: Some(s.placement),
                            percentage: Some(next),
                            previous_percentage: Some(s.percentage),
                            reason: Some(format!("{}: {}% -> {next}%", s.placement, s.percentage)),
                            ..Default::default()
                        },
                    )]
                }
                _ if efficient => continue,
                _ => Vec::new(),
            };

            let entity = EntityRef::campaign(s.campaign_id.clone());
            out.matches.push(ConditionMatch {
                match_key: format!("{}/{}", s.campaign_id, s.placement),
                lineage: vec![entity.clone()],
                entity,
                message: format!(
                    "Placement {} in campaign {}: ACoS {} vs target {:.1}% at +{}%",
                    s.placement,
                    s.campaign_id,
                    acos.map_or_else(|| "n/a".to_string(), |a| format!("{a:.1}%")),
                    p.target_acos,
                    s.percentage
                ),
                snapshot: json!({
                    "placement": s.placement,
                    "percentage": s.percentage,
                    "metrics": s.metrics.snapshot(),
                }),
                changes,
            });
        }
        Ok(out)
    }
}
