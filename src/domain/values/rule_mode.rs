use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How far a rule is allowed to go when its condition matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleMode {
    /// Alerts only, never an action.
    DryRun,
    /// Alerts carrying proposed actions that wait for user approval.
    Suggestion,
    /// Alerts plus actions admitted straight to the queue.
    Auto,
}

impl fmt::Display for RuleMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleMode::DryRun => write!(f, "dry_run"),
            RuleMode::Suggestion => write!(f, "suggestion"),
            RuleMode::Auto => write!(f, "auto"),
        }
    }
}

impl FromStr for RuleMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dry_run" => Ok(RuleMode::DryRun),
            "suggestion" => Ok(RuleMode::Suggestion),
            "auto" => Ok(RuleMode::Auto),
            _ => Err(format!("Unknown rule mode: {s}")),
        }
    }
}
