use super::{db_err, enum_col, lock, parse_ts, ts, SharedConnection};
use crate::domain::entities::protected_entity::ProtectedEntity;
use crate::domain::error::DomainError;
use crate::domain::ports::protected_entity_repository::ProtectedEntityRepository;
use crate::domain::values::entity_type::EntityRef;
use rusqlite::params;

pub struct SqliteProtectedRepo {
    conn: SharedConnection,
}

impl SqliteProtectedRepo {
    pub fn new(conn: SharedConnection) -> Self {
        Self { conn }
    }
}

impl ProtectedEntityRepository for SqliteProtectedRepo {
    fn add(&self, entity: &ProtectedEntity) -> Result<(), DomainError> {
        let conn = lock(&self.conn)?;
        conn.execute(
            "INSERT INTO protected_entities (entity_type, entity_id, reason, created_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(entity_type, entity_id) DO UPDATE SET reason = excluded.reason",
            params![
                entity.entity_type.to_string(),
                entity.entity_id,
                entity.reason,
                ts(&entity.created_at),
            ],
        )
        .map_err(db_err("Failed to protect entity"))?;
        Ok(())
    }

    fn remove(&self, entity: &EntityRef) -> Result<bool, DomainError> {
        let conn = lock(&self.conn)?;
        let rows = conn
            .execute(
                "DELETE FROM protected_entities WHERE entity_type = ?1 AND entity_id = ?2",
                params![entity.entity_type.to_string(), entity.entity_id],
            )
            .map_err(db_err("Failed to unprotect entity"))?;
        Ok(rows > 0)
    }

    fn list(&self) -> Result<Vec<ProtectedEntity>, DomainError> {
        let conn = lock(&self.conn)?;
        let mut stmt = conn
            .prepare(
                "SELECT entity_type, entity_id, reason, created_at FROM protected_entities
                 ORDER BY entity_type, entity_id",
            )
            .map_err(db_err("Failed to prepare protected list"))?;
        let entities = stmt
            .query_map([], |row| {
                let entity_type: String = row.get(0)?;
                let created: String = row.get(3)?;
                Ok(ProtectedEntity {
                    entity_type: enum_col(0, &entity_type)?,
                    entity_id: row.get(1)?,
                    reason: row.get(2)?,
                    created_at: parse_ts(&created),
                })
            })
            .map_err(db_err("Failed to list protected entities"))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(db_err("Failed to decode protected entity"))?;
        Ok(entities)
    }

    fn contains(&self, entity: &EntityRef) -> Result<bool, DomainError> {
        let conn = lock(&self.conn)?;
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM protected_entities WHERE entity_type = ?1 AND entity_id = ?2",
                params![entity.entity_type.to_string(), entity.entity_id],
                |row| row.get(0),
            )
            .map_err(db_err("Failed to check protection"))?;
        Ok(count > 0)
    }
}
