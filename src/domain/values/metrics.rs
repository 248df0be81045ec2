use serde::{Deserialize, Serialize};

/// Performance facts for one entity over a window. Missing data is all zeros.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EntityMetrics {
    pub spend: f64,
    pub clicks: i64,
    pub impressions: i64,
    pub sales: f64,
    pub orders: i64,
}

impl EntityMetrics {
    /// Advertising cost of sales in percent. `None` without sales.
    pub fn acos(&self) -> Option<f64> {
        (self.sales > 0.0).then(|| self.spend / self.sales * 100.0)
    }

    /// Return on ad spend. `None` without spend.
    pub fn roas(&self) -> Option<f64> {
        (self.spend > 0.0).then(|| self.sales / self.spend)
    }

    /// Spend per attributed order. `None` without orders.
    pub fn cost_per_order(&self) -> Option<f64> {
        (self.orders > 0).then(|| self.spend / self.orders as f64)
    }

    pub fn cpc(&self) -> Option<f64> {
        (self.clicks > 0).then(|| self.spend / self.clicks as f64)
    }

    pub fn is_empty(&self) -> bool {
        self.spend == 0.0 && self.clicks == 0 && self.impressions == 0 && self.orders == 0
    }

    /// Snapshot including derived ratios, stored on alerts and outcomes.
    pub fn snapshot(&self) -> serde_json::Value {
        serde_json::json!({
            "spend": self.spend,
            "clicks": self.clicks,
            "impressions": self.impressions,
            "sales": self.sales,
            "orders": self.orders,
            "acos": self.acos(),
            "roas": self.roas(),
        })
    }

    pub fn delta(&self, after: &EntityMetrics) -> MetricDelta {
        MetricDelta {
            spend: after.spend - self.spend,
            clicks: after.clicks - self.clicks,
            impressions: after.impressions - self.impressions,
            sales: after.sales - self.sales,
            orders: after.orders - self.orders,
            acos: after.acos().zip(self.acos()).map(|(a, b)| a - b),
            roas: after.roas().zip(self.roas()).map(|(a, b)| a - b),
        }
    }
}

impl std::ops::AddAssign for EntityMetrics {
    fn add_assign(&mut self, rhs: Self) {
        self.spend += rhs.spend;
        self.clicks += rhs.clicks;
        self.impressions += rhs.impressions;
        self.sales += rhs.sales;
        self.orders += rhs.orders;
    }
}

/// `after - before` per metric.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MetricDelta {
    pub spend: f64,
    pub clicks: i64,
    pub impressions: i64,
    pub sales: f64,
    pub orders: i64,
    pub acos: Option<f64>,
    pub roas: Option<f64>,
}

pub fn to_micros(amount: f64) -> i64 {
    (amount * 1_000_000.0).round() as i64
}

pub fn from_micros(micros: i64) -> f64 {
    micros as f64 / 1_000_000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ratios_undefined_without_denominator() {
        let m = EntityMetrics {
            spend: 12.0,
            clicks: 25,
            ..Default::default()
        };
        assert_eq!(m.acos(), None);
        assert_eq!(m.roas(), Some(0.0));
        assert_eq!(m.cost_per_order(), None);
        assert!(EntityMetrics::default().roas().is_none());
    }

    #[test]
    fn test_delta_is_after_minus_before() {
        let before = EntityMetrics {
            spend: 100.0,
            clicks: 50,
            impressions: 1000,
            sales: 250.0,
            orders: 10,
        };
        let after = EntityMetrics {
            spend: 80.0,
            clicks: 45,
            impressions: 900,
            sales: 320.0,
            orders: 12,
        };
        let d = before.delta(&after);
        assert_eq!(d.spend, -20.0);
        assert_eq!(d.orders, 2);
        assert!((d.acos.unwrap() - (25.0 - 40.0)).abs() < 1e-9);
    }

    #[test]
    fn test_micros_conversion() {
        assert_eq!(to_micros(1.25), 1_250_000);
        assert_eq!(from_micros(750_000), 0.75);
    }
}
