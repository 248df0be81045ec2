use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertState {
    New,
    Acknowledged,
    Muted,
    Resolved,
}

impl AlertState {
    pub fn can_transition_to(&self, next: AlertState) -> bool {
        matches!(
            (self, next),
            (AlertState::New, AlertState::Acknowledged)
                | (AlertState::New, AlertState::Muted)
                | (AlertState::New, AlertState::Resolved)
                | (AlertState::Acknowledged, AlertState::Muted)
                | (AlertState::Acknowledged, AlertState::Resolved)
                | (AlertState::Muted, AlertState::Resolved)
        )
    }

    /// Open alerts are the ones the system may auto-resolve.
    pub fn is_open(&self) -> bool {
        matches!(self, AlertState::New | AlertState::Acknowledged)
    }
}

impl fmt::Display for AlertState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertState::New => write!(f, "new"),
            AlertState::Acknowledged => write!(f, "acknowledged"),
            AlertState::Muted => write!(f, "muted"),
            AlertState::Resolved => write!(f, "resolved"),
        }
    }
}

impl FromStr for AlertState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "new" => Ok(AlertState::New),
            "acknowledged" => Ok(AlertState::Acknowledged),
            "muted" => Ok(AlertState::Muted),
            "resolved" => Ok(AlertState::Resolved),
            _ => Err(format!("Unknown alert state: {s}")),
        }
    }
}
