use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One distinct change the ads platform can apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    PauseCampaign,
    CreateKeyword,
    NegativeKeyword,
    SetBid,
    SetPlacementAdjust,
    SetCampaignBudget,
}

impl ActionType {
    pub const ALL: [ActionType; 6] = [
        ActionType::PauseCampaign,
        ActionType::CreateKeyword,
        ActionType::NegativeKeyword,
        ActionType::SetBid,
        ActionType::SetPlacementAdjust,
        ActionType::SetCampaignBudget,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::PauseCampaign => "pause_campaign",
            ActionType::CreateKeyword => "create_keyword",
            ActionType::NegativeKeyword => "negative_keyword",
            ActionType::SetBid => "set_bid",
            ActionType::SetPlacementAdjust => "set_placement_adjust",
            ActionType::SetCampaignBudget => "set_campaign_budget",
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ActionType::ALL
            .into_iter()
            .find(|t| t.as_str() == s.to_lowercase())
            .ok_or_else(|| format!("Unknown action type: {s}"))
    }
}
