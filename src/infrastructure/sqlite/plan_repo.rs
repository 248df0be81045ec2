use super::{db_err, lock, ts, SharedConnection};
use crate::domain::error::DomainError;
use crate::domain::ports::plan_source::PlanSource;
use crate::domain::values::plan_tier::PlanTier;
use chrono::Utc;
use rusqlite::{params, OptionalExtension};

/// Local mirror of subscription plans. Users without a row are on the free plan.
pub struct SqlitePlanStore {
    conn: SharedConnection,
}

impl SqlitePlanStore {
    pub fn new(conn: SharedConnection) -> Self {
        Self { conn }
    }

    pub fn set_plan(&self, user_id: &str, plan: PlanTier) -> Result<(), DomainError> {
        let conn = lock(&self.conn)?;
        conn.execute(
            "INSERT INTO user_plans (user_id, plan, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(user_id) DO UPDATE SET plan = excluded.plan, updated_at = excluded.updated_at",
            params![user_id, plan.to_string(), ts(&Utc::now())],
        )
        .map_err(db_err("Failed to set plan"))?;
        Ok(())
    }
}

impl PlanSource for SqlitePlanStore {
    fn get_plan(&self, user_id: &str) -> Result<PlanTier, DomainError> {
        let conn = lock(&self.conn)?;
        let raw: Option<String> = conn
            .query_row(
                "SELECT plan FROM user_plans WHERE user_id = ?1",
                params![user_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(db_err("Failed to read plan"))?;
        match raw {
            Some(s) => s.parse().map_err(DomainError::Parse),
            None => Ok(PlanTier::default()),
        }
    }
}
