//! Deterministic keys for queued actions and alerts.
//!
//! A key hashes (rule, entity, action, trigger window) so re-evaluating the
//! same window yields the same key and the unique index rejects the repeat.

use chrono::NaiveDate;
use sha2::{Digest, Sha256};

pub fn action_key(rule_id: &str, entity_id: &str, action_type: &str, window_day: NaiveDate) -> String {
    digest(&["action", rule_id, entity_id, action_type, &window_day.to_string()])
}

/// Key for the audit record of a policy denial. It sits outside the action
/// keyspace, so a denied proposal can still be admitted later in the same
/// window while repeated denials share one record.
pub fn skip_record_key(action_key: &str) -> String {
    format!("{action_key}:skipped")
}

pub fn alert_key(rule_id: &str, entity_id: &str, window_day: NaiveDate) -> String {
    digest(&["alert", rule_id, entity_id, &window_day.to_string()])
}

fn digest(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_bytes());
        hasher.update([0x1f]);
    }
    format!("{:x}", hasher.finalize())
}
