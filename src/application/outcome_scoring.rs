//! Outcome scoring: a set of pluggable factors, each a relative improvement
//! clamped to [-1, 1], averaged into one score.

use crate::domain::values::metrics::EntityMetrics;

pub trait ScoreFactor: Send + Sync {
    fn name(&self) -> &'static str;
    /// Relative improvement from `before` to `after`, or `None` when the
    /// metric is undefined on either side.
    fn improvement(&self, before: &EntityMetrics, after: &EntityMetrics) -> Option<f64>;
}

/// Lower ACoS is better.
pub struct AcosImprovement;

impl ScoreFactor for AcosImprovement {
    fn name(&self) -> &'static str {
        "acos"
    }

    fn improvement(&self, before: &EntityMetrics, after: &EntityMetrics) -> Option<f64> {
        relative_drop(before.acos()?, after.acos()?)
    }
}

/// Higher ROAS is better.
pub struct RoasImprovement;

impl ScoreFactor for RoasImprovement {
    fn name(&self) -> &'static str {
        "roas"
    }

    fn improvement(&self, before: &EntityMetrics, after: &EntityMetrics) -> Option<f64> {
        let b = before.roas()?;
        let a = after.roas()?;
        if b == 0.0 {
            return None;
        }
        Some((a - b) / b)
    }
}

/// Spend efficiency: lower cost per order is better.
pub struct CostPerOrderImprovement;

impl ScoreFactor for CostPerOrderImprovement {
    fn name(&self) -> &'static str {
        "cost_per_order"
    }

    fn improvement(&self, before: &EntityMetrics, after: &EntityMetrics) -> Option<f64> {
        relative_drop(before.cost_per_order()?, after.cost_per_order()?)
    }
}

fn relative_drop(before: f64, after: f64) -> Option<f64> {
    if before == 0.0 {
        return None;
    }
    Some((before - after) / before)
}

pub struct OutcomeScorer {
    factors: Vec<Box<dyn ScoreFactor>>,
}

impl Default for OutcomeScorer {
    fn default() -> Self {
        Self::new(vec![
            Box::new(AcosImprovement),
            Box::new(RoasImprovement),
            Box::new(CostPerOrderImprovement),
        ])
    }
}

impl OutcomeScorer {
    pub fn new(factors: Vec<Box<dyn ScoreFactor>>) -> Self {
        Self { factors }
    }

    /// Mean of the comparable factors; `None` when no factor is comparable.
    pub fn score(&self, before: &EntityMetrics, after: &EntityMetrics) -> Option<f64> {
        let values: Vec<f64> = self
            .factors
            .iter()
            .filter_map(|f| f.improvement(before, after))
            .filter(|v| v.is_finite())
            .map(|v| v.clamp(-1.0, 1.0))
            .collect();
        if values.is_empty() {
            return None;
        }
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}
