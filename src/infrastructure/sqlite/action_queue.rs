use super::outcome_repo::insert_outcome;
use super::{db_err, enum_col, json_col, lock, parse_opt_ts, parse_ts, to_json, ts, SharedConnection};
use crate::domain::entities::action_outcome::ActionOutcome;
use crate::domain::entities::queued_action::{BeforeState, QueuedAction};
use crate::domain::error::DomainError;
use crate::domain::ports::action_queue::{ActionFilter, ActionQueue};
use crate::domain::values::action_status::ActionStatus;
use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};

const INSERT_COLS: &str = "id, rule_id, rule_type, origin, profile_id, user_id, action_type, payload, idempotency_key, status, before_state, error, attempts, created_at, applied_at, updated_at";
const SELECT_COLS: &str = "id, rule_id, rule_type, origin, profile_id, user_id, action_type, payload, idempotency_key, status, before_state, error, attempts, created_at, applied_at, updated_at, claimed_by";

/// Claims older than this are considered abandoned by a crashed worker.
pub const DEFAULT_CLAIM_LEASE_SECS: u64 = 900;

pub struct SqliteActionQueue {
    conn: SharedConnection,
    claim_lease: Duration,
}

impl SqliteActionQueue {
    pub fn new(conn: SharedConnection) -> Self {
        Self::with_claim_lease(conn, DEFAULT_CLAIM_LEASE_SECS)
    }

    pub fn with_claim_lease(conn: SharedConnection, lease_secs: u64) -> Self {
        Self {
            conn,
            claim_lease: Duration::seconds(lease_secs as i64),
        }
    }

    fn row_to_action(row: &rusqlite::Row) -> Result<QueuedAction, rusqlite::Error> {
        let rule_type: Option<String> = row.get(2)?;
        let origin: String = row.get(3)?;
        let action_type: String = row.get(6)?;
        let payload: String = row.get(7)?;
        let status: String = row.get(9)?;
        let before_state: Option<String> = row.get(10)?;
        let created: String = row.get(13)?;
        let updated: String = row.get(15)?;

        Ok(QueuedAction {
            id: row.get(0)?,
            rule_id: row.get(1)?,
            rule_type: rule_type.map(|r| enum_col(2, &r)).transpose()?,
            origin: enum_col(3, &origin)?,
            profile_id: row.get(4)?,
            user_id: row.get(5)?,
            action_type: enum_col(6, &action_type)?,
            payload: json_col(7, &payload)?,
            idempotency_key: row.get(8)?,
            status: enum_col(9, &status)?,
            before_state: before_state.map(|b| json_col(10, &b)).transpose()?,
            error: row.get(11)?,
            attempts: row.get::<_, i64>(12)? as u32,
            created_at: parse_ts(&created),
            applied_at: parse_opt_ts(row.get(14)?),
            updated_at: parse_ts(&updated),
            claimed_by: row.get(16)?,
        })
    }
}

/// Explain why a conditional status update touched no row.
fn transition_error(conn: &Connection, id: &str, claim: &str, to: ActionStatus) -> DomainError {
    let current: Result<Option<(String, Option<String>)>, _> = conn
        .query_row(
            "SELECT status, claimed_by FROM queued_actions WHERE id = ?1",
            params![id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional();
    match current {
        Ok(Some((from, holder))) if holder.as_deref() != Some(claim) && from == "applying" => {
            DomainError::IllegalTransition {
                entity: "action",
                from: format!("{from} (claimed by another worker)"),
                to: to.to_string(),
            }
        }
        Ok(Some((from, _))) => DomainError::IllegalTransition {
            entity: "action",
            from,
            to: to.to_string(),
        },
        Ok(None) => DomainError::NotFound(format!("Action not found: {id}")),
        Err(e) => DomainError::Database(format!("Failed to read action status: {e}")),
    }
}

impl ActionQueue for SqliteActionQueue {
    fn enqueue(&self, action: &QueuedAction) -> Result<bool, DomainError> {
        let conn = lock(&self.conn)?;
        let rows = conn
            .execute(
                &format!("INSERT OR IGNORE INTO queued_actions ({INSERT_COLS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)"),
                params![
                    action.id,
                    action.rule_id,
                    action.rule_type.map(|r| r.to_string()),
                    action.origin.to_string(),
                    action.profile_id,
                    action.user_id,
                    action.action_type.to_string(),
                    to_json(&action.payload)?,
                    action.idempotency_key,
                    action.status.to_string(),
                    action.before_state.as_ref().map(to_json).transpose()?,
                    action.error,
                    action.attempts as i64,
                    ts(&action.created_at),
                    action.applied_at.map(|t| ts(&t)),
                    ts(&action.updated_at),
                ],
            )
            .map_err(db_err("Failed to enqueue action"))?;
        Ok(rows == 1)
    }

    fn dequeue(
        &self,
        batch_size: usize,
        worker_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<QueuedAction>, DomainError> {
        if batch_size == 0 {
            return Ok(Vec::new());
        }
        let claim = format!("{worker_id}:{}", uuid::Uuid::new_v4());
        let lease_cutoff = ts(&(now - self.claim_lease));

        let mut conn = lock(&self.conn)?;
        // IMMEDIATE takes the write lock up front so two processes cannot
        // select the same rows before either has claimed them.
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(db_err("Failed to begin dequeue"))?;

        let candidates: Vec<String> = {
            let mut stmt = tx
                .prepare(
                    "SELECT id FROM queued_actions
                     WHERE status = 'queued' AND (claimed_by IS NULL OR claimed_at < ?1)
                     ORDER BY created_at ASC, id ASC LIMIT ?2",
                )
                .map_err(db_err("Failed to prepare dequeue"))?;
            let ids = stmt
                .query_map(params![lease_cutoff, batch_size as i64], |row| row.get(0))
                .map_err(db_err("Failed to select queued actions"))?
                .collect::<Result<Vec<_>, _>>()
                .map_err(db_err("Failed to read queued action id"))?;
            ids
        };

        for id in &candidates {
            tx.execute(
                "UPDATE queued_actions SET claimed_by = ?1, claimed_at = ?2
                 WHERE id = ?3 AND status = 'queued' AND (claimed_by IS NULL OR claimed_at < ?4)",
                params![claim, ts(&now), id, lease_cutoff],
            )
            .map_err(db_err("Failed to claim action"))?;
        }

        let claimed = {
            let mut stmt = tx
                .prepare(&format!(
                    "SELECT {SELECT_COLS} FROM queued_actions WHERE claimed_by = ?1 ORDER BY created_at ASC, id ASC"
                ))
                .map_err(db_err("Failed to prepare claimed lookup"))?;
            let rows = stmt
                .query_map(params![claim], Self::row_to_action)
                .map_err(db_err("Failed to load claimed actions"))?
                .collect::<Result<Vec<_>, _>>()
                .map_err(db_err("Failed to decode claimed action"))?;
            rows
        };

        tx.commit().map_err(db_err("Failed to commit dequeue"))?;
        tracing::debug!(worker = worker_id, claimed = claimed.len(), "dequeued actions");
        Ok(claimed)
    }

    fn get(&self, id: &str) -> Result<Option<QueuedAction>, DomainError> {
        let conn = lock(&self.conn)?;
        conn.query_row(
            &format!("SELECT {SELECT_COLS} FROM queued_actions WHERE id = ?1"),
            params![id],
            Self::row_to_action,
        )
        .optional()
        .map_err(db_err("Failed to load action"))
    }

    fn get_by_key(&self, idempotency_key: &str) -> Result<Option<QueuedAction>, DomainError> {
        let conn = lock(&self.conn)?;
        conn.query_row(
            &format!("SELECT {SELECT_COLS} FROM queued_actions WHERE idempotency_key = ?1"),
            params![idempotency_key],
            Self::row_to_action,
        )
        .optional()
        .map_err(db_err("Failed to load action by key"))
    }

    fn list(&self, filter: &ActionFilter) -> Result<Vec<QueuedAction>, DomainError> {
        let conn = lock(&self.conn)?;
        let mut sql = format!("SELECT {SELECT_COLS} FROM queued_actions WHERE 1=1");
        let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

        if let Some(status) = filter.status {
            sql.push_str(&format!(" AND status = ?{}", param_values.len() + 1));
            param_values.push(Box::new(status.to_string()));
        }
        if let Some(rule_id) = &filter.rule_id {
            sql.push_str(&format!(" AND rule_id = ?{}", param_values.len() + 1));
            param_values.push(Box::new(rule_id.clone()));
        }
        sql.push_str(" ORDER BY created_at DESC");
        if let Some(limit) = filter.limit {
            sql.push_str(&format!(" LIMIT ?{}", param_values.len() + 1));
            param_values.push(Box::new(limit as i64));
        }

        let params_refs: Vec<&dyn rusqlite::types::ToSql> =
            param_values.iter().map(|p| p.as_ref()).collect();
        let mut stmt = conn.prepare(&sql).map_err(db_err("Failed to prepare action list"))?;
        let actions = stmt
            .query_map(params_refs.as_slice(), Self::row_to_action)
            .map_err(db_err("Failed to list actions"))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(db_err("Failed to decode action"))?;
        Ok(actions)
    }

    fn begin_apply(&self, id: &str, claim: &str, now: DateTime<Utc>) -> Result<bool, DomainError> {
        let conn = lock(&self.conn)?;
        let rows = conn
            .execute(
                "UPDATE queued_actions SET status = 'applying', claimed_at = ?1, updated_at = ?1
                 WHERE id = ?2 AND status = 'queued' AND claimed_by = ?3",
                params![ts(&now), id, claim],
            )
            .map_err(db_err("Failed to start applying action"))?;
        Ok(rows == 1)
    }

    fn mark_applied(
        &self,
        id: &str,
        claim: &str,
        before_state: &BeforeState,
        attempts: u32,
        outcome: &ActionOutcome,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        let mut conn = lock(&self.conn)?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(db_err("Failed to begin apply"))?;
        let rows = tx
            .execute(
                "UPDATE queued_actions SET status = 'applied', before_state = ?1, attempts = ?2,
                 applied_at = ?3, updated_at = ?3, error = NULL, claimed_by = NULL, claimed_at = NULL
                 WHERE id = ?4 AND status = 'applying' AND claimed_by = ?5",
                params![to_json(before_state)?, attempts as i64, ts(&now), id, claim],
            )
            .map_err(db_err("Failed to mark action applied"))?;
        if rows == 0 {
            return Err(transition_error(&tx, id, claim, ActionStatus::Applied));
        }
        insert_outcome(&tx, outcome)?;
        tx.commit().map_err(db_err("Failed to commit applied action"))
    }

    fn mark_failed(
        &self,
        id: &str,
        claim: &str,
        error: &str,
        attempts: u32,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        let conn = lock(&self.conn)?;
        let rows = conn
            .execute(
                "UPDATE queued_actions SET status = 'failed', error = ?1, attempts = ?2, updated_at = ?3,
                 claimed_by = NULL, claimed_at = NULL
                 WHERE id = ?4 AND status = 'applying' AND claimed_by = ?5",
                params![error, attempts as i64, ts(&now), id, claim],
            )
            .map_err(db_err("Failed to mark action failed"))?;
        if rows == 0 {
            return Err(transition_error(&conn, id, claim, ActionStatus::Failed));
        }
        Ok(())
    }

    fn mark_skipped(&self, id: &str, claim: &str, reason: &str, now: DateTime<Utc>) -> Result<(), DomainError> {
        let conn = lock(&self.conn)?;
        let rows = conn
            .execute(
                "UPDATE queued_actions SET status = 'skipped', error = ?1, updated_at = ?2,
                 claimed_by = NULL, claimed_at = NULL
                 WHERE id = ?3 AND status = 'applying' AND claimed_by = ?4",
                params![reason, ts(&now), id, claim],
            )
            .map_err(db_err("Failed to mark action skipped"))?;
        if rows == 0 {
            return Err(transition_error(&conn, id, claim, ActionStatus::Skipped));
        }
        Ok(())
    }

    fn mark_reverted(&self, id: &str, now: DateTime<Utc>) -> Result<bool, DomainError> {
        let conn = lock(&self.conn)?;
        let rows = conn
            .execute(
                "UPDATE queued_actions SET status = 'reverted', updated_at = ?1
                 WHERE id = ?2 AND status = 'applied'",
                params![ts(&now), id],
            )
            .map_err(db_err("Failed to mark action reverted"))?;
        Ok(rows == 1)
    }

    fn last_applied_at(&self, rule_id: &str) -> Result<Option<DateTime<Utc>>, DomainError> {
        let conn = lock(&self.conn)?;
        let raw: Option<String> = conn
            .query_row(
                "SELECT MAX(applied_at) FROM queued_actions WHERE rule_id = ?1 AND applied_at IS NOT NULL",
                params![rule_id],
                |row| row.get(0),
            )
            .map_err(db_err("Failed to read last applied action"))?;
        Ok(parse_opt_ts(raw))
    }

    fn count_admitted_since(&self, rule_id: &str, since: DateTime<Utc>) -> Result<usize, DomainError> {
        let conn = lock(&self.conn)?;
        let since = ts(&since);
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM queued_actions
                 WHERE rule_id = ?1
                   AND ((applied_at IS NOT NULL AND applied_at >= ?2)
                        OR (status IN ('queued', 'applying') AND created_at >= ?2))",
                params![rule_id, since],
                |row| row.get(0),
            )
            .map_err(db_err("Failed to count admitted actions"))?;
        Ok(count as usize)
    }
}
