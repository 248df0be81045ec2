use std::sync::Arc;

use crate::domain::error::DomainError;
use crate::domain::ports::protected_entity_repository::ProtectedEntityRepository;
use crate::domain::values::entity_type::EntityRef;

/// Denylist check consulted at evaluation time and again right before a
/// change is sent to the platform.
pub struct ProtectedEntityGuard {
    repo: Arc<dyn ProtectedEntityRepository>,
}

impl ProtectedEntityGuard {
    pub fn new(repo: Arc<dyn ProtectedEntityRepository>) -> Self {
        Self { repo }
    }

    pub fn is_protected(&self, entity: &EntityRef) -> Result<bool, DomainError> {
        self.repo.contains(entity)
    }

    /// First protected entity in a lineage (campaign, ad group, keyword...).
    pub fn first_protected(&self, lineage: &[EntityRef]) -> Result<Option<EntityRef>, DomainError> {
        for entity in lineage {
            if self.repo.contains(entity)? {
                return Ok(Some(entity.clone()));
            }
        }
        Ok(None)
    }
}
