use crate::domain::entities::protected_entity::ProtectedEntity;
use crate::domain::error::DomainError;
use crate::domain::values::entity_type::EntityRef;

pub trait ProtectedEntityRepository: Send + Sync {
    fn add(&self, entity: &ProtectedEntity) -> Result<(), DomainError>;
    fn remove(&self, entity: &EntityRef) -> Result<bool, DomainError>;
    fn list(&self) -> Result<Vec<ProtectedEntity>, DomainError>;
    fn contains(&self, entity: &EntityRef) -> Result<bool, DomainError>;
}
