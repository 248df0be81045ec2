use super::{db_err, enum_col, json_col, lock, parse_ts, to_json, ts, SharedConnection};
use crate::domain::entities::alert::Alert;
use crate::domain::error::DomainError;
use crate::domain::ports::alert_repository::{AlertFilter, AlertRepository};
use crate::domain::values::alert_state::AlertState;
use crate::domain::values::entity_type::EntityRef;
use chrono::{DateTime, Utc};
use rusqlite::params;

const SELECT_COLS: &str = "id, rule_id, profile_id, entity_type, entity_id, severity, message, metric_snapshot, proposed_actions, protected, state, dedupe_key, created_at, updated_at";

pub struct SqliteAlertRepo {
    conn: SharedConnection,
}

impl SqliteAlertRepo {
    pub fn new(conn: SharedConnection) -> Self {
        Self { conn }
    }

    fn row_to_alert(row: &rusqlite::Row) -> Result<Alert, rusqlite::Error> {
        let entity_type: String = row.get(3)?;
        let severity: String = row.get(5)?;
        let snapshot: String = row.get(7)?;
        let proposed: String = row.get(8)?;
        let protected: i32 = row.get(9)?;
        let state: String = row.get(10)?;
        let created: String = row.get(12)?;
        let updated: String = row.get(13)?;

        Ok(Alert {
            id: row.get(0)?,
            rule_id: row.get(1)?,
            profile_id: row.get(2)?,
            entity: EntityRef::new(enum_col(3, &entity_type)?, row.get::<_, String>(4)?),
            severity: enum_col(5, &severity)?,
            message: row.get(6)?,
            metric_snapshot: json_col(7, &snapshot)?,
            proposed_actions: json_col(8, &proposed)?,
            protected: protected != 0,
            state: enum_col(10, &state)?,
            dedupe_key: row.get(11)?,
            created_at: parse_ts(&created),
            updated_at: parse_ts(&updated),
        })
    }
}

impl AlertRepository for SqliteAlertRepo {
    fn insert_if_absent(&self, alert: &Alert) -> Result<bool, DomainError> {
        let conn = lock(&self.conn)?;
        let rows = conn
            .execute(
                &format!("INSERT OR IGNORE INTO alerts ({SELECT_COLS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)"),
                params![
                    alert.id,
                    alert.rule_id,
                    alert.profile_id,
                    alert.entity.entity_type.to_string(),
                    alert.entity.entity_id,
                    alert.severity.to_string(),
                    alert.message,
                    alert.metric_snapshot.to_string(),
                    to_json(&alert.proposed_actions)?,
                    alert.protected as i32,
                    alert.state.to_string(),
                    alert.dedupe_key,
                    ts(&alert.created_at),
                    ts(&alert.updated_at),
                ],
            )
            .map_err(db_err("Failed to insert alert"))?;
        Ok(rows == 1)
    }

    fn get(&self, id: &str) -> Result<Option<Alert>, DomainError> {
        let conn = lock(&self.conn)?;
        let mut stmt = conn
            .prepare(&format!("SELECT {SELECT_COLS} FROM alerts WHERE id = ?1"))
            .map_err(db_err("Failed to prepare alert lookup"))?;
        let mut rows = stmt
            .query_map(params![id], Self::row_to_alert)
            .map_err(db_err("Failed to load alert"))?;
        rows.next()
            .transpose()
            .map_err(db_err("Failed to decode alert"))
    }

    fn list(&self, filter: &AlertFilter) -> Result<Vec<Alert>, DomainError> {
        let conn = lock(&self.conn)?;
        let mut sql = format!("SELECT {SELECT_COLS} FROM alerts WHERE 1=1");
        let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

        if let Some(rule_id) = &filter.rule_id {
            sql.push_str(&format!(" AND rule_id = ?{}", param_values.len() + 1));
            param_values.push(Box::new(rule_id.clone()));
        }
        if let Some(state) = filter.state {
            sql.push_str(&format!(" AND state = ?{}", param_values.len() + 1));
            param_values.push(Box::new(state.to_string()));
        }
        sql.push_str(" ORDER BY created_at DESC");
        if let Some(limit) = filter.limit {
            sql.push_str(&format!(" LIMIT ?{}", param_values.len() + 1));
            param_values.push(Box::new(limit as i64));
        }

        let params_refs: Vec<&dyn rusqlite::types::ToSql> =
            param_values.iter().map(|p| p.as_ref()).collect();
        let mut stmt = conn.prepare(&sql).map_err(db_err("Failed to prepare alert list"))?;
        let alerts = stmt
            .query_map(params_refs.as_slice(), Self::row_to_alert)
            .map_err(db_err("Failed to list alerts"))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(db_err("Failed to decode alert"))?;
        Ok(alerts)
    }

    fn transition(
        &self,
        id: &str,
        from: AlertState,
        to: AlertState,
        now: DateTime<Utc>,
    ) -> Result<bool, DomainError> {
        if !from.can_transition_to(to) {
            return Err(DomainError::IllegalTransition {
                entity: "alert",
                from: from.to_string(),
                to: to.to_string(),
            });
        }
        let conn = lock(&self.conn)?;
        let rows = conn
            .execute(
                "UPDATE alerts SET state = ?1, updated_at = ?2 WHERE id = ?3 AND state = ?4",
                params![to.to_string(), ts(&now), id, from.to_string()],
            )
            .map_err(db_err("Failed to update alert state"))?;
        Ok(rows == 1)
    }

    fn resolve_cleared(
        &self,
        rule_id: &str,
        still_matching: &[String],
        now: DateTime<Utc>,
    ) -> Result<usize, DomainError> {
        let conn = lock(&self.conn)?;
        let mut stmt = conn
            .prepare(
                "SELECT id, entity_type, entity_id FROM alerts
                 WHERE rule_id = ?1 AND state IN ('new', 'acknowledged')",
            )
            .map_err(db_err("Failed to prepare open alert scan"))?;
        let open: Vec<(String, String)> = stmt
            .query_map(params![rule_id], |row| {
                let id: String = row.get(0)?;
                let etype: String = row.get(1)?;
                let eid: String = row.get(2)?;
                Ok((id, format!("{etype}:{eid}")))
            })
            .map_err(db_err("Failed to scan open alerts"))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(db_err("Failed to decode open alert"))?;

        let mut resolved = 0;
        for (id, entity) in open {
            if still_matching.iter().any(|m| *m == entity) {
                continue;
            }
            resolved += conn
                .execute(
                    "UPDATE alerts SET state = 'resolved', updated_at = ?1
                     WHERE id = ?2 AND state IN ('new', 'acknowledged')",
                    params![ts(&now), id],
                )
                .map_err(db_err("Failed to resolve alert"))?;
        }
        Ok(resolved)
    }
}
