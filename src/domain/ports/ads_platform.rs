//! Write side of the advertising platform.

use crate::domain::values::targeting::{MatchType, Placement};
use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

/// One concrete platform mutation. Forward actions and their reverts both
/// travel as change requests.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ChangeRequest {
    PauseCampaign {
        campaign_id: String,
    },
    EnableCampaign {
        campaign_id: String,
    },
    CreateKeyword {
        campaign_id: String,
        ad_group_id: String,
        keyword_text: String,
        match_type: MatchType,
        bid_micros: i64,
    },
    ArchiveKeyword {
        keyword_id: String,
    },
    CreateNegativeKeyword {
        campaign_id: String,
        /// `None` attaches the negative at campaign level.
        ad_group_id: Option<String>,
        keyword_text: String,
        match_type: MatchType,
    },
    ArchiveNegativeKeyword {
        campaign_id: String,
        ad_group_id: Option<String>,
        negative_keyword_id: String,
    },
    SetKeywordBid {
        keyword_id: String,
        bid_micros: i64,
    },
    SetTargetBid {
        target_id: String,
        bid_micros: i64,
    },
    SetPlacementAdjust {
        campaign_id: String,
        placement: Placement,
        percentage: i32,
    },
    SetCampaignBudget {
        campaign_id: String,
        budget_micros: i64,
    },
}

impl ChangeRequest {
    pub fn op(&self) -> &'static str {
        match self {
            ChangeRequest::PauseCampaign { .. } => "pause_campaign",
            ChangeRequest::EnableCampaign { .. } => "enable_campaign",
            ChangeRequest::CreateKeyword { .. } => "create_keyword",
            ChangeRequest::ArchiveKeyword { .. } => "archive_keyword",
            ChangeRequest::CreateNegativeKeyword { .. } => "create_negative_keyword",
            ChangeRequest::ArchiveNegativeKeyword { .. } => "archive_negative_keyword",
            ChangeRequest::SetKeywordBid { .. } => "set_keyword_bid",
            ChangeRequest::SetTargetBid { .. } => "set_target_bid",
            ChangeRequest::SetPlacementAdjust { .. } => "set_placement_adjust",
            ChangeRequest::SetCampaignBudget { .. } => "set_campaign_budget",
        }
    }
}

/// What the platform reports back for a successful change.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ApplyReceipt {
    /// Id of an entity the change created.
    pub created_entity_id: Option<String>,
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum PlatformError {
    /// The request was malformed; retrying cannot help.
    #[error("rejected request: {0}")]
    Validation(String),
    /// Rate limiting or a server-side failure.
    #[error("transient failure: {0}")]
    Transient(String),
    #[error("request timed out after {0}s")]
    Timeout(u64),
    /// Entity missing or in a state that forbids the change.
    #[error("permanent failure: {0}")]
    Permanent(String),
}

impl PlatformError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, PlatformError::Transient(_) | PlatformError::Timeout(_))
    }

    /// Classify an HTTP status code returned by the platform.
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            400 | 422 => PlatformError::Validation(format!("{status}: {body}")),
            408 | 425 | 429 => PlatformError::Transient(format!("{status}: {body}")),
            s if s >= 500 => PlatformError::Transient(format!("{status}: {body}")),
            _ => PlatformError::Permanent(format!("{status}: {body}")),
        }
    }
}

#[async_trait]
pub trait AdsPlatform: Send + Sync {
    fn name(&self) -> &str;

    /// Apply one change for a profile. Called at most once per attempt; the
    /// caller owns retries.
    async fn apply(&self, profile_id: &str, change: &ChangeRequest) -> Result<ApplyReceipt, PlatformError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert!(PlatformError::from_status(429, String::new()).is_retryable());
        assert!(PlatformError::from_status(503, String::new()).is_retryable());
        assert!(!PlatformError::from_status(404, String::new()).is_retryable());
        assert!(matches!(
            PlatformError::from_status(400, String::new()),
            PlatformError::Validation(_)
        ));
        assert!(PlatformError::Timeout(30).is_retryable());
    }
}
