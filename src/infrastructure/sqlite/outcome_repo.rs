use super::{db_err, enum_col, json_col, lock, parse_opt_ts, parse_ts, to_json, ts, SharedConnection};
use crate::domain::entities::action_outcome::ActionOutcome;
use crate::domain::error::DomainError;
use crate::domain::ports::outcome_repository::OutcomeRepository;
use crate::domain::values::entity_type::EntityRef;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

const SELECT_COLS: &str = "id, action_id, profile_id, entity_type, entity_id, lookback_days, before_metrics, after_scheduled_at, after_metrics, metric_delta, outcome_score, outcome_status, created_at, collected_at";

pub struct SqliteOutcomeRepo {
    conn: SharedConnection,
}

impl SqliteOutcomeRepo {
    pub fn new(conn: SharedConnection) -> Self {
        Self { conn }
    }

    fn row_to_outcome(row: &rusqlite::Row) -> Result<ActionOutcome, rusqlite::Error> {
        let entity_type: String = row.get(3)?;
        let before: String = row.get(6)?;
        let scheduled: String = row.get(7)?;
        let after: Option<String> = row.get(8)?;
        let delta: Option<String> = row.get(9)?;
        let status: String = row.get(11)?;
        let created: String = row.get(12)?;

        Ok(ActionOutcome {
            id: row.get(0)?,
            action_id: row.get(1)?,
            profile_id: row.get(2)?,
            entity: EntityRef::new(enum_col(3, &entity_type)?, row.get::<_, String>(4)?),
            lookback_days: row.get::<_, i64>(5)? as u32,
            before_metrics: json_col(6, &before)?,
            after_scheduled_at: parse_ts(&scheduled),
            after_metrics: after.map(|a| json_col(8, &a)).transpose()?,
            metric_delta: delta.map(|d| json_col(9, &d)).transpose()?,
            outcome_score: row.get(10)?,
            outcome_status: enum_col(11, &status)?,
            created_at: parse_ts(&created),
            collected_at: parse_opt_ts(row.get(13)?),
        })
    }
}

/// Shared with the action queue, which writes the pending outcome in the same
/// transaction that marks its action applied.
pub(super) fn insert_outcome(conn: &Connection, outcome: &ActionOutcome) -> Result<(), DomainError> {
    conn.execute(
        &format!("INSERT INTO action_outcomes ({SELECT_COLS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)"),
        params![
            outcome.id,
            outcome.action_id,
            outcome.profile_id,
            outcome.entity.entity_type.to_string(),
            outcome.entity.entity_id,
            outcome.lookback_days as i64,
            to_json(&outcome.before_metrics)?,
            ts(&outcome.after_scheduled_at),
            outcome.after_metrics.as_ref().map(to_json).transpose()?,
            outcome.metric_delta.as_ref().map(to_json).transpose()?,
            outcome.outcome_score,
            outcome.outcome_status.to_string(),
            ts(&outcome.created_at),
            outcome.collected_at.map(|t| ts(&t)),
        ],
    )
    .map_err(db_err("Failed to create outcome"))?;
    Ok(())
}

impl OutcomeRepository for SqliteOutcomeRepo {
    fn create(&self, outcome: &ActionOutcome) -> Result<(), DomainError> {
        let conn = lock(&self.conn)?;
        insert_outcome(&conn, outcome)
    }

    fn due(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<ActionOutcome>, DomainError> {
        let conn = lock(&self.conn)?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {SELECT_COLS} FROM action_outcomes
                 WHERE outcome_status = 'pending' AND after_scheduled_at <= ?1
                 ORDER BY after_scheduled_at ASC LIMIT ?2"
            ))
            .map_err(db_err("Failed to prepare due outcomes"))?;
        let outcomes = stmt
            .query_map(params![ts(&now), limit as i64], Self::row_to_outcome)
            .map_err(db_err("Failed to load due outcomes"))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(db_err("Failed to decode outcome"))?;
        Ok(outcomes)
    }

    fn complete_if_pending(&self, outcome: &ActionOutcome) -> Result<usize, DomainError> {
        let conn = lock(&self.conn)?;
        conn.execute(
            "UPDATE action_outcomes SET after_metrics = ?1, metric_delta = ?2, outcome_score = ?3,
             outcome_status = ?4, collected_at = ?5
             WHERE id = ?6 AND outcome_status = 'pending'",
            params![
                outcome.after_metrics.as_ref().map(to_json).transpose()?,
                outcome.metric_delta.as_ref().map(to_json).transpose()?,
                outcome.outcome_score,
                outcome.outcome_status.to_string(),
                outcome.collected_at.map(|t| ts(&t)),
                outcome.id,
            ],
        )
        .map_err(db_err("Failed to complete outcome"))
    }

    fn get_by_action(&self, action_id: &str) -> Result<Option<ActionOutcome>, DomainError> {
        let conn = lock(&self.conn)?;
        conn.query_row(
            &format!("SELECT {SELECT_COLS} FROM action_outcomes WHERE action_id = ?1"),
            params![action_id],
            Self::row_to_outcome,
        )
        .optional()
        .map_err(db_err("Failed to load outcome"))
    }

    fn list(&self, limit: usize) -> Result<Vec<ActionOutcome>, DomainError> {
        let conn = lock(&self.conn)?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {SELECT_COLS} FROM action_outcomes ORDER BY created_at DESC LIMIT ?1"
            ))
            .map_err(db_err("Failed to prepare outcome list"))?;
        let outcomes = stmt
            .query_map(params![limit as i64], Self::row_to_outcome)
            .map_err(db_err("Failed to list outcomes"))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(db_err("Failed to decode outcome"))?;
        Ok(outcomes)
    }
}
