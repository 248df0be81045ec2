use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of advertising entity a rule, action or protection refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Campaign,
    AdGroup,
    Keyword,
    Target,
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityType::Campaign => write!(f, "campaign"),
            EntityType::AdGroup => write!(f, "ad_group"),
            EntityType::Keyword => write!(f, "keyword"),
            EntityType::Target => write!(f, "target"),
        }
    }
}

impl FromStr for EntityType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "campaign" => Ok(EntityType::Campaign),
            "ad_group" | "adgroup" => Ok(EntityType::AdGroup),
            "keyword" => Ok(EntityType::Keyword),
            "target" => Ok(EntityType::Target),
            _ => Err(format!("Unknown entity type: {s}")),
        }
    }
}

/// A typed pointer at one advertising entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    pub entity_type: EntityType,
    pub entity_id: String,
}

impl EntityRef {
    pub fn new(entity_type: EntityType, entity_id: impl Into<String>) -> Self {
        Self {
            entity_type,
            entity_id: entity_id.into(),
        }
    }

    pub fn campaign(id: impl Into<String>) -> Self {
        Self::new(EntityType::Campaign, id)
    }

    pub fn ad_group(id: impl Into<String>) -> Self {
        Self::new(EntityType::AdGroup, id)
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.entity_type, self.entity_id)
    }
}
