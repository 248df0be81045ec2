use crate::domain::values::entity_type::{EntityRef, EntityType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A campaign, ad group, keyword or target that automation must never touch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtectedEntity {
    pub entity_type: EntityType,
    pub entity_id: String,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ProtectedEntity {
    pub fn new(entity: EntityRef, reason: Option<String>) -> Self {
        Self {
            entity_type: entity.entity_type,
            entity_id: entity.entity_id,
            reason,
            created_at: Utc::now(),
        }
    }
}
