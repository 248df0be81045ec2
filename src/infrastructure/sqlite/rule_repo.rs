use super::{db_err, enum_col, json_col, lock, parse_ts, to_json, ts, SharedConnection};
use crate::domain::entities::automation_rule::{AutomationRule, RuleParams};
use crate::domain::error::DomainError;
use crate::domain::ports::rule_repository::{RuleFilter, RuleRepository};
use chrono::Utc;
use rusqlite::params;

const SELECT_COLS: &str = "id, user_id, profile_id, name, rule_type, params, mode, severity, action, throttle, enabled, disabled_reason, utc_offset_minutes, created_at, updated_at";

pub struct SqliteRuleRepo {
    conn: SharedConnection,
}

impl SqliteRuleRepo {
    pub fn new(conn: SharedConnection) -> Self {
        Self { conn }
    }

    fn row_to_rule(row: &rusqlite::Row) -> Result<AutomationRule, rusqlite::Error> {
        let rule_type: String = row.get(4)?;
        let params_raw: String = row.get(5)?;
        let mode: String = row.get(6)?;
        let severity: String = row.get(7)?;
        let action: String = row.get(8)?;
        let throttle: String = row.get(9)?;
        let enabled: i32 = row.get(10)?;
        let created: String = row.get(13)?;
        let updated: String = row.get(14)?;

        // params are stored as the bare bag; the discriminant lives in rule_type
        let tagged = format!(r#"{{"rule_type":{},"params":{}}}"#, serde_json::Value::String(rule_type), params_raw);
        let params: RuleParams = json_col(5, &tagged)?;

        Ok(AutomationRule {
            id: row.get(0)?,
            user_id: row.get(1)?,
            profile_id: row.get(2)?,
            name: row.get(3)?,
            params,
            mode: enum_col(6, &mode)?,
            severity: enum_col(7, &severity)?,
            action: json_col(8, &action)?,
            throttle: json_col(9, &throttle)?,
            enabled: enabled != 0,
            disabled_reason: row.get(11)?,
            profile_utc_offset_minutes: row.get(12)?,
            created_at: parse_ts(&created),
            updated_at: parse_ts(&updated),
        })
    }
}

fn params_bag(params: &RuleParams) -> Result<String, DomainError> {
    let tagged = serde_json::to_value(params)
        .map_err(|e| DomainError::Parse(format!("JSON encode failed: {e}")))?;
    Ok(tagged["params"].to_string())
}

impl RuleRepository for SqliteRuleRepo {
    fn add(&self, rule: &AutomationRule) -> Result<(), DomainError> {
        let conn = lock(&self.conn)?;
        conn.execute(
            &format!("INSERT INTO automation_rules ({SELECT_COLS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)"),
            params![
                rule.id,
                rule.user_id,
                rule.profile_id,
                rule.name,
                rule.rule_type().to_string(),
                params_bag(&rule.params)?,
                rule.mode.to_string(),
                rule.severity.to_string(),
                to_json(&rule.action)?,
                to_json(&rule.throttle)?,
                rule.enabled as i32,
                rule.disabled_reason,
                rule.profile_utc_offset_minutes,
                ts(&rule.created_at),
                ts(&rule.updated_at),
            ],
        )
        .map_err(db_err("Failed to add rule"))?;
        Ok(())
    }

    fn update(&self, rule: &AutomationRule) -> Result<(), DomainError> {
        let conn = lock(&self.conn)?;
        let rows = conn
            .execute(
                "UPDATE automation_rules SET name = ?1, rule_type = ?2, params = ?3, mode = ?4, severity = ?5,
                 action = ?6, throttle = ?7, enabled = ?8, disabled_reason = ?9, utc_offset_minutes = ?10, updated_at = ?11
                 WHERE id = ?12",
                params![
                    rule.name,
                    rule.rule_type().to_string(),
                    params_bag(&rule.params)?,
                    rule.mode.to_string(),
                    rule.severity.to_string(),
                    to_json(&rule.action)?,
                    to_json(&rule.throttle)?,
                    rule.enabled as i32,
                    rule.disabled_reason,
                    rule.profile_utc_offset_minutes,
                    ts(&Utc::now()),
                    rule.id,
                ],
            )
            .map_err(db_err("Failed to update rule"))?;
        if rows == 0 {
            return Err(DomainError::NotFound(format!("Rule not found: {}", rule.id)));
        }
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<AutomationRule>, DomainError> {
        let conn = lock(&self.conn)?;
        let mut stmt = conn
            .prepare(&format!("SELECT {SELECT_COLS} FROM automation_rules WHERE id = ?1"))
            .map_err(db_err("Failed to prepare rule lookup"))?;
        let mut rows = stmt
            .query_map(params![id], Self::row_to_rule)
            .map_err(db_err("Failed to load rule"))?;
        rows.next()
            .transpose()
            .map_err(db_err("Failed to decode rule"))
    }

    fn list(&self, filter: &RuleFilter) -> Result<Vec<AutomationRule>, DomainError> {
        let conn = lock(&self.conn)?;
        let mut sql = format!("SELECT {SELECT_COLS} FROM automation_rules WHERE 1=1");
        let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

        if let Some(profile) = &filter.profile_id {
            sql.push_str(&format!(" AND profile_id = ?{}", param_values.len() + 1));
            param_values.push(Box::new(profile.clone()));
        }
        if let Some(enabled) = filter.enabled {
            sql.push_str(&format!(" AND enabled = ?{}", param_values.len() + 1));
            param_values.push(Box::new(enabled as i32));
        }
        sql.push_str(" ORDER BY created_at ASC");

        let params_refs: Vec<&dyn rusqlite::types::ToSql> =
            param_values.iter().map(|p| p.as_ref()).collect();
        let mut stmt = conn.prepare(&sql).map_err(db_err("Failed to prepare rule list"))?;
        let rules = stmt
            .query_map(params_refs.as_slice(), Self::row_to_rule)
            .map_err(db_err("Failed to list rules"))?
            .filter_map(|r| match r {
                Ok(rule) => Some(rule),
                Err(e) => {
                    tracing::warn!(error = %e, "skipping undecodable rule row");
                    None
                }
            })
            .collect();
        Ok(rules)
    }

    fn set_enabled(&self, id: &str, enabled: bool, reason: Option<&str>) -> Result<(), DomainError> {
        let conn = lock(&self.conn)?;
        let rows = conn
            .execute(
                "UPDATE automation_rules SET enabled = ?1, disabled_reason = ?2, updated_at = ?3 WHERE id = ?4",
                params![
                    enabled as i32,
                    if enabled { None } else { reason },
                    ts(&Utc::now()),
                    id
                ],
            )
            .map_err(db_err("Failed to toggle rule"))?;
        if rows == 0 {
            return Err(DomainError::NotFound(format!("Rule not found: {id}")));
        }
        Ok(())
    }
}
