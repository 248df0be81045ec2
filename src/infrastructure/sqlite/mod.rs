pub mod action_queue;
pub mod alert_repo;
pub mod metrics_store;
pub mod migrations;
pub mod outcome_repo;
pub mod plan_repo;
pub mod protected_repo;
pub mod rule_repo;
pub mod run_repo;

use crate::domain::error::DomainError;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::Connection;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// One connection shared by the repositories of a single process instance.
pub type SharedConnection = Arc<Mutex<Connection>>;

const BUSY_TIMEOUT: Duration = Duration::from_secs(10);

/// Open a connection with WAL journaling and a busy timeout so concurrent
/// workers on the same file wait instead of failing.
pub fn open_connection(db_path: &str) -> Result<Connection, DomainError> {
    let conn = Connection::open(db_path)
        .map_err(|e| DomainError::Database(format!("DB error: {e}")))?;
    if db_path != ":memory:" {
        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(|e| DomainError::Database(format!("WAL error: {e}")))?;
    }
    conn.busy_timeout(BUSY_TIMEOUT)
        .map_err(|e| DomainError::Database(format!("busy_timeout error: {e}")))?;
    conn.pragma_update(None, "foreign_keys", "ON")
        .map_err(|e| DomainError::Database(format!("foreign_keys error: {e}")))?;
    Ok(conn)
}

pub fn shared(conn: Connection) -> SharedConnection {
    Arc::new(Mutex::new(conn))
}

pub(crate) fn lock(conn: &SharedConnection) -> Result<MutexGuard<'_, Connection>, DomainError> {
    conn.lock().map_err(|e| DomainError::Database(e.to_string()))
}

pub(crate) fn db_err(context: &'static str) -> impl Fn(rusqlite::Error) -> DomainError {
    move |e| DomainError::Database(format!("{context}: {e}"))
}

/// Fixed-width UTC timestamps so text comparison in SQL matches time order.
pub(crate) fn ts(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_ts(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| {
            tracing::warn!(value = s, "invalid timestamp in database, using now");
            Utc::now()
        })
}

pub(crate) fn parse_opt_ts(s: Option<String>) -> Option<DateTime<Utc>> {
    s.and_then(|s| {
        DateTime::parse_from_rfc3339(&s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    })
}

/// Decode a JSON column, surfacing corruption as a conversion error.
pub(crate) fn json_col<T: serde::de::DeserializeOwned>(idx: usize, raw: &str) -> Result<T, rusqlite::Error> {
    serde_json::from_str(raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

/// Decode an enum stored via `Display`, surfacing bad values as a conversion error.
pub(crate) fn enum_col<T: std::str::FromStr<Err = String>>(idx: usize, raw: &str) -> Result<T, rusqlite::Error> {
    raw.parse::<T>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Text,
            Box::new(DomainError::Parse(e)),
        )
    })
}

pub(crate) fn to_json<T: serde::Serialize>(value: &T) -> Result<String, DomainError> {
    serde_json::to_string(value).map_err(|e| DomainError::Parse(format!("JSON encode failed: {e}")))
}
