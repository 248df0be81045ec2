use crate::domain::ports::ads_platform::{AdsPlatform, ApplyReceipt, ChangeRequest, PlatformError};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};

/// Accepts every change without contacting the platform. Used when no
/// credentials are configured and for dry operational runs of the executor.
#[derive(Default)]
pub struct SimulatedAdsPlatform {
    applied: AtomicU64,
}

impl SimulatedAdsPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn applied_count(&self) -> u64 {
        self.applied.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl AdsPlatform for SimulatedAdsPlatform {
    fn name(&self) -> &str {
        "simulated"
    }

    async fn apply(&self, profile_id: &str, change: &ChangeRequest) -> Result<ApplyReceipt, PlatformError> {
        let n = self.applied.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::info!(profile_id, op = change.op(), n, "simulated change applied");
        let created_entity_id = match change {
            ChangeRequest::CreateKeyword { .. } | ChangeRequest::CreateNegativeKeyword { .. } => {
                Some(format!("sim-{}", uuid::Uuid::new_v4()))
            }
            _ => None,
        };
        Ok(ApplyReceipt { created_entity_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_creations_get_ids() {
        let platform = SimulatedAdsPlatform::new();
        let receipt = platform
            .apply("p1", &ChangeRequest::ArchiveKeyword { keyword_id: "kw1".into() })
            .await
            .unwrap();
        assert!(receipt.created_entity_id.is_none());

        let receipt = platform
            .apply(
                "p1",
                &ChangeRequest::CreateNegativeKeyword {
                    campaign_id: "c1".into(),
                    ad_group_id: None,
                    keyword_text: "free".into(),
                    match_type: crate::domain::values::targeting::MatchType::NegativeExact,
                },
            )
            .await
            .unwrap();
        assert!(receipt.created_entity_id.unwrap().starts_with("sim-"));
        assert_eq!(platform.applied_count(), 2);
    }
}
