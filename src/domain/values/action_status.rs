use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle of a queued action.
///
/// ```text
/// queued ──► applying ──► applied ──► reverted
///               │
///               ├───────► failed
///               └───────► skipped
/// ```
///
/// `applying` is taken under the worker's claim before any platform call and
/// is never handed out again, so a change goes out at most once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionStatus {
    Queued,
    Applying,
    Applied,
    Failed,
    Skipped,
    Reverted,
}

impl ActionStatus {
    pub fn can_transition_to(&self, next: ActionStatus) -> bool {
        matches!(
            (self, next),
            (ActionStatus::Queued, ActionStatus::Applying)
                | (ActionStatus::Applying, ActionStatus::Applied)
                | (ActionStatus::Applying, ActionStatus::Failed)
                | (ActionStatus::Applying, ActionStatus::Skipped)
                | (ActionStatus::Applied, ActionStatus::Reverted)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ActionStatus::Failed | ActionStatus::Skipped | ActionStatus::Reverted
        )
    }
}

impl fmt::Display for ActionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionStatus::Queued => write!(f, "queued"),
            ActionStatus::Applying => write!(f, "applying"),
            ActionStatus::Applied => write!(f, "applied"),
            ActionStatus::Failed => write!(f, "failed"),
            ActionStatus::Skipped => write!(f, "skipped"),
            ActionStatus::Reverted => write!(f, "reverted"),
        }
    }
}

impl FromStr for ActionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "queued" => Ok(ActionStatus::Queued),
            "applying" => Ok(ActionStatus::Applying),
            "applied" => Ok(ActionStatus::Applied),
            "failed" => Ok(ActionStatus::Failed),
            "skipped" => Ok(ActionStatus::Skipped),
            "reverted" => Ok(ActionStatus::Reverted),
            _ => Err(format!("Unknown action status: {s}")),
        }
    }
}

/// Who put an action on the queue. Only `Auto` actions are re-gated by plan
/// entitlement at execution time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionOrigin {
    Auto,
    Approved,
    Manual,
}

impl fmt::Display for ActionOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionOrigin::Auto => write!(f, "auto"),
            ActionOrigin::Approved => write!(f, "approved"),
            ActionOrigin::Manual => write!(f, "manual"),
        }
    }
}

impl FromStr for ActionOrigin {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(ActionOrigin::Auto),
            "approved" => Ok(ActionOrigin::Approved),
            "manual" => Ok(ActionOrigin::Manual),
            _ => Err(format!("Unknown action origin: {s}")),
        }
    }
}
