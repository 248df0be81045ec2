use super::{db_err, enum_col, lock, parse_opt_ts, parse_ts, ts, SharedConnection};
use crate::domain::entities::rule_run::RuleRun;
use crate::domain::error::DomainError;
use crate::domain::ports::run_repository::RunRepository;
use crate::domain::values::run_status::RunStatus;
use rusqlite::params;

const SELECT_COLS: &str = "id, rule_id, started_at, finished_at, status, evaluated, alerts_created, actions_enqueued, actions_skipped, error";

pub struct SqliteRunRepo {
    conn: SharedConnection,
}

impl SqliteRunRepo {
    pub fn new(conn: SharedConnection) -> Self {
        Self { conn }
    }

    fn row_to_run(row: &rusqlite::Row) -> Result<RuleRun, rusqlite::Error> {
        let started: String = row.get(2)?;
        let status: String = row.get(4)?;
        Ok(RuleRun {
            id: row.get(0)?,
            rule_id: row.get(1)?,
            started_at: parse_ts(&started),
            finished_at: parse_opt_ts(row.get(3)?),
            status: enum_col(4, &status)?,
            evaluated: row.get::<_, i64>(5)? as usize,
            alerts_created: row.get::<_, i64>(6)? as usize,
            actions_enqueued: row.get::<_, i64>(7)? as usize,
            actions_skipped: row.get::<_, i64>(8)? as usize,
            error: row.get(9)?,
        })
    }
}

impl RunRepository for SqliteRunRepo {
    fn insert(&self, run: &RuleRun) -> Result<(), DomainError> {
        let conn = lock(&self.conn)?;
        conn.execute(
            &format!("INSERT INTO rule_runs ({SELECT_COLS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"),
            params![
                run.id,
                run.rule_id,
                ts(&run.started_at),
                run.finished_at.map(|t| ts(&t)),
                run.status.to_string(),
                run.evaluated as i64,
                run.alerts_created as i64,
                run.actions_enqueued as i64,
                run.actions_skipped as i64,
                run.error,
            ],
        )
        .map_err(db_err("Failed to insert rule run"))?;
        Ok(())
    }

    fn finish(&self, run: &RuleRun) -> Result<(), DomainError> {
        if !run.is_finished() {
            return Err(DomainError::Validation(format!(
                "run {} is still running",
                run.id
            )));
        }
        let conn = lock(&self.conn)?;
        let rows = conn
            .execute(
                "UPDATE rule_runs SET finished_at = ?1, status = ?2, evaluated = ?3, alerts_created = ?4,
                 actions_enqueued = ?5, actions_skipped = ?6, error = ?7
                 WHERE id = ?8 AND status = 'running'",
                params![
                    run.finished_at.map(|t| ts(&t)),
                    run.status.to_string(),
                    run.evaluated as i64,
                    run.alerts_created as i64,
                    run.actions_enqueued as i64,
                    run.actions_skipped as i64,
                    run.error,
                    run.id,
                ],
            )
            .map_err(db_err("Failed to finish rule run"))?;
        if rows == 0 {
            return Err(DomainError::IllegalTransition {
                entity: "rule run",
                from: "finished".into(),
                to: run.status.to_string(),
            });
        }
        Ok(())
    }

    fn recent_statuses(&self, rule_id: &str, limit: usize) -> Result<Vec<RunStatus>, DomainError> {
        let conn = lock(&self.conn)?;
        let mut stmt = conn
            .prepare(
                "SELECT status FROM rule_runs WHERE rule_id = ?1 AND status != 'running'
                 ORDER BY started_at DESC LIMIT ?2",
            )
            .map_err(db_err("Failed to prepare run history"))?;
        let statuses = stmt
            .query_map(params![rule_id, limit as i64], |row| {
                let s: String = row.get(0)?;
                enum_col::<RunStatus>(0, &s)
            })
            .map_err(db_err("Failed to load run history"))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(db_err("Failed to decode run history"))?;
        Ok(statuses)
    }

    fn list(&self, rule_id: Option<&str>, limit: usize) -> Result<Vec<RuleRun>, DomainError> {
        let conn = lock(&self.conn)?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {SELECT_COLS} FROM rule_runs WHERE (?1 IS NULL OR rule_id = ?1)
                 ORDER BY started_at DESC LIMIT ?2"
            ))
            .map_err(db_err("Failed to prepare run list"))?;
        let runs = stmt
            .query_map(params![rule_id, limit as i64], Self::row_to_run)
            .map_err(db_err("Failed to list runs"))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(db_err("Failed to decode run"))?;
        Ok(runs)
    }
}
