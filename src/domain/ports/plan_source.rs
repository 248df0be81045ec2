use crate::domain::error::DomainError;
use crate::domain::values::plan_tier::PlanTier;

/// Read-only view of the user's subscription plan.
pub trait PlanSource: Send + Sync {
    fn get_plan(&self, user_id: &str) -> Result<PlanTier, DomainError>;
}
