use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    Exact,
    Phrase,
    Broad,
    NegativeExact,
    NegativePhrase,
}

impl MatchType {
    pub fn is_negative(&self) -> bool {
        matches!(self, MatchType::NegativeExact | MatchType::NegativePhrase)
    }
}

impl fmt::Display for MatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchType::Exact => write!(f, "exact"),
            MatchType::Phrase => write!(f, "phrase"),
            MatchType::Broad => write!(f, "broad"),
            MatchType::NegativeExact => write!(f, "negative_exact"),
            MatchType::NegativePhrase => write!(f, "negative_phrase"),
        }
    }
}

impl FromStr for MatchType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "exact" => Ok(MatchType::Exact),
            "phrase" => Ok(MatchType::Phrase),
            "broad" => Ok(MatchType::Broad),
            "negative_exact" => Ok(MatchType::NegativeExact),
            "negative_phrase" => Ok(MatchType::NegativePhrase),
            _ => Err(format!("Unknown match type: {s}")),
        }
    }
}

/// Sponsored Products placement buckets that accept a bid adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Placement {
    TopOfSearch,
    ProductPages,
    RestOfSearch,
}

impl fmt::Display for Placement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Placement::TopOfSearch => write!(f, "top_of_search"),
            Placement::ProductPages => write!(f, "product_pages"),
            Placement::RestOfSearch => write!(f, "rest_of_search"),
        }
    }
}

impl FromStr for Placement {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "top_of_search" => Ok(Placement::TopOfSearch),
            "product_pages" => Ok(Placement::ProductPages),
            "rest_of_search" => Ok(Placement::RestOfSearch),
            _ => Err(format!("Unknown placement: {s}")),
        }
    }
}

/// Where a negative keyword is attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum NegateScope {
    #[default]
    AdGroup,
    Campaign,
}

impl fmt::Display for NegateScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NegateScope::AdGroup => write!(f, "ad_group"),
            NegateScope::Campaign => write!(f, "campaign"),
        }
    }
}
