use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Closed set of automation conditions a rule can evaluate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleType {
    BudgetDepletion,
    SpendSpike,
    SearchTermHarvest,
    SearchTermPrune,
    BidDown,
    BidUp,
    PlacementOpt,
}

impl RuleType {
    pub const ALL: [RuleType; 7] = [
        RuleType::BudgetDepletion,
        RuleType::SpendSpike,
        RuleType::SearchTermHarvest,
        RuleType::SearchTermPrune,
        RuleType::BidDown,
        RuleType::BidUp,
        RuleType::PlacementOpt,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RuleType::BudgetDepletion => "budget_depletion",
            RuleType::SpendSpike => "spend_spike",
            RuleType::SearchTermHarvest => "search_term_harvest",
            RuleType::SearchTermPrune => "search_term_prune",
            RuleType::BidDown => "bid_down",
            RuleType::BidUp => "bid_up",
            RuleType::PlacementOpt => "placement_opt",
        }
    }
}

impl fmt::Display for RuleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RuleType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RuleType::ALL
            .into_iter()
            .find(|t| t.as_str() == s.to_lowercase())
            .ok_or_else(|| format!("Unknown rule type: {s}"))
    }
}
