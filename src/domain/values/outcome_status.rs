use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Effectiveness verdict for an applied action. `Pending` is the only
/// non-terminal state and is left exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    Pending,
    Positive,
    Neutral,
    Negative,
    Inconclusive,
}

/// Scores at or beyond this magnitude count as a real effect.
pub const OUTCOME_SCORE_THRESHOLD: f64 = 0.2;

impl OutcomeStatus {
    pub fn can_transition_to(&self, next: OutcomeStatus) -> bool {
        *self == OutcomeStatus::Pending && next != OutcomeStatus::Pending
    }

    /// Map an outcome score to a verdict. `None` means no factor was comparable.
    pub fn from_score(score: Option<f64>) -> Self {
        match score {
            None => OutcomeStatus::Inconclusive,
            Some(s) if s >= OUTCOME_SCORE_THRESHOLD => OutcomeStatus::Positive,
            Some(s) if s <= -OUTCOME_SCORE_THRESHOLD => OutcomeStatus::Negative,
            Some(_) => OutcomeStatus::Neutral,
        }
    }
}

impl fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutcomeStatus::Pending => write!(f, "pending"),
            OutcomeStatus::Positive => write!(f, "positive"),
            OutcomeStatus::Neutral => write!(f, "neutral"),
            OutcomeStatus::Negative => write!(f, "negative"),
            OutcomeStatus::Inconclusive => write!(f, "inconclusive"),
        }
    }
}

impl FromStr for OutcomeStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(OutcomeStatus::Pending),
            "positive" => Ok(OutcomeStatus::Positive),
            "neutral" => Ok(OutcomeStatus::Neutral),
            "negative" => Ok(OutcomeStatus::Negative),
            "inconclusive" => Ok(OutcomeStatus::Inconclusive),
            _ => Err(format!("Unknown outcome status: {s}")),
        }
    }
}
