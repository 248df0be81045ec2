use crate::domain::values::run_status::RunStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Audit record of one evaluation pass. Append-only once finished.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleRun {
    pub id: String,
    pub rule_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub status: RunStatus,
    pub evaluated: usize,
    pub alerts_created: usize,
    pub actions_enqueued: usize,
    pub actions_skipped: usize,
    pub error: Option<String>,
}

/// Counters accumulated while a run is in progress.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunCounts {
    pub evaluated: usize,
    pub alerts_created: usize,
    pub actions_enqueued: usize,
    pub actions_skipped: usize,
}

impl RuleRun {
    pub fn start(rule_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            rule_id: rule_id.to_string(),
            started_at: now,
            finished_at: None,
            status: RunStatus::Running,
            evaluated: 0,
            alerts_created: 0,
            actions_enqueued: 0,
            actions_skipped: 0,
            error: None,
        }
    }

    /// Close the run. Counts persisted before a failure are kept alongside the error.
    pub fn finish(&mut self, counts: RunCounts, error: Option<String>, now: DateTime<Utc>) {
        self.evaluated = counts.evaluated;
        self.alerts_created = counts.alerts_created;
        self.actions_enqueued = counts.actions_enqueued;
        self.actions_skipped = counts.actions_skipped;
        self.status = if error.is_some() {
            RunStatus::Error
        } else {
            RunStatus::Success
        };
        self.error = error;
        self.finished_at = Some(now);
    }

    pub fn is_finished(&self) -> bool {
        self.status != RunStatus::Running
    }
}
