use crate::domain::error::DomainError;
use rusqlite::Connection;

pub fn run_migrations(conn: &Connection) -> Result<(), DomainError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS automation_rules (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            profile_id TEXT NOT NULL,
            name TEXT NOT NULL,
            rule_type TEXT NOT NULL,
            params TEXT NOT NULL,
            mode TEXT NOT NULL,
            severity TEXT NOT NULL,
            action TEXT NOT NULL,
            throttle TEXT NOT NULL,
            enabled INTEGER NOT NULL DEFAULT 1,
            disabled_reason TEXT,
            utc_offset_minutes INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS rule_runs (
            id TEXT PRIMARY KEY,
            rule_id TEXT NOT NULL,
            started_at TEXT NOT NULL,
            finished_at TEXT,
            status TEXT NOT NULL,
            evaluated INTEGER NOT NULL DEFAULT 0,
            alerts_created INTEGER NOT NULL DEFAULT 0,
            actions_enqueued INTEGER NOT NULL DEFAULT 0,
            actions_skipped INTEGER NOT NULL DEFAULT 0,
            error TEXT
        );

        CREATE TABLE IF NOT EXISTS alerts (
            id TEXT PRIMARY KEY,
            rule_id TEXT NOT NULL,
            profile_id TEXT NOT NULL,
            entity_type TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            severity TEXT NOT NULL,
            message TEXT NOT NULL,
            metric_snapshot TEXT NOT NULL,
            proposed_actions TEXT NOT NULL DEFAULT '[]',
            protected INTEGER NOT NULL DEFAULT 0,
            state TEXT NOT NULL,
            dedupe_key TEXT NOT NULL UNIQUE,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS queued_actions (
            id TEXT PRIMARY KEY,
            rule_id TEXT,
            rule_type TEXT,
            origin TEXT NOT NULL,
            profile_id TEXT NOT NULL,
            user_id TEXT NOT NULL,
            action_type TEXT NOT NULL,
            payload TEXT NOT NULL,
            idempotency_key TEXT NOT NULL UNIQUE,
            status TEXT NOT NULL,
            before_state TEXT,
            error TEXT,
            attempts INTEGER NOT NULL DEFAULT 0,
            claimed_by TEXT,
            claimed_at TEXT,
            created_at TEXT NOT NULL,
            applied_at TEXT,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS action_outcomes (
            id TEXT PRIMARY KEY,
            action_id TEXT NOT NULL UNIQUE,
            profile_id TEXT NOT NULL,
            entity_type TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            lookback_days INTEGER NOT NULL,
            before_metrics TEXT NOT NULL,
            after_scheduled_at TEXT NOT NULL,
            after_metrics TEXT,
            metric_delta TEXT,
            outcome_score REAL,
            outcome_status TEXT NOT NULL,
            created_at TEXT NOT NULL,
            collected_at TEXT
        );

        CREATE TABLE IF NOT EXISTS protected_entities (
            entity_type TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            reason TEXT,
            created_at TEXT NOT NULL,
            PRIMARY KEY (entity_type, entity_id)
        );

        CREATE TABLE IF NOT EXISTS user_plans (
            user_id TEXT PRIMARY KEY,
            plan TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS campaigns (
            profile_id TEXT NOT NULL,
            campaign_id TEXT NOT NULL,
            name TEXT NOT NULL,
            state TEXT NOT NULL,
            daily_budget REAL NOT NULL,
            PRIMARY KEY (profile_id, campaign_id)
        );

        CREATE TABLE IF NOT EXISTS entity_daily_metrics (
            profile_id TEXT NOT NULL,
            entity_type TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            date TEXT NOT NULL,
            spend REAL NOT NULL DEFAULT 0,
            clicks INTEGER NOT NULL DEFAULT 0,
            impressions INTEGER NOT NULL DEFAULT 0,
            sales REAL NOT NULL DEFAULT 0,
            orders INTEGER NOT NULL DEFAULT 0,
            impression_share REAL,
            PRIMARY KEY (profile_id, entity_type, entity_id, date)
        );

        CREATE TABLE IF NOT EXISTS search_term_daily (
            profile_id TEXT NOT NULL,
            campaign_id TEXT NOT NULL,
            ad_group_id TEXT NOT NULL,
            search_term TEXT NOT NULL,
            date TEXT NOT NULL,
            spend REAL NOT NULL DEFAULT 0,
            clicks INTEGER NOT NULL DEFAULT 0,
            impressions INTEGER NOT NULL DEFAULT 0,
            sales REAL NOT NULL DEFAULT 0,
            orders INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (profile_id, campaign_id, ad_group_id, search_term, date)
        );

        CREATE TABLE IF NOT EXISTS targets (
            profile_id TEXT NOT NULL,
            entity_type TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            campaign_id TEXT NOT NULL,
            ad_group_id TEXT NOT NULL,
            text TEXT,
            match_type TEXT,
            bid REAL NOT NULL,
            state TEXT NOT NULL DEFAULT 'enabled',
            PRIMARY KEY (profile_id, entity_type, entity_id)
        );

        CREATE TABLE IF NOT EXISTS placement_daily (
            profile_id TEXT NOT NULL,
            campaign_id TEXT NOT NULL,
            placement TEXT NOT NULL,
            date TEXT NOT NULL,
            spend REAL NOT NULL DEFAULT 0,
            clicks INTEGER NOT NULL DEFAULT 0,
            impressions INTEGER NOT NULL DEFAULT 0,
            sales REAL NOT NULL DEFAULT 0,
            orders INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (profile_id, campaign_id, placement, date)
        );

        CREATE TABLE IF NOT EXISTS placement_settings (
            profile_id TEXT NOT NULL,
            campaign_id TEXT NOT NULL,
            placement TEXT NOT NULL,
            percentage INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (profile_id, campaign_id, placement)
        );

        CREATE INDEX IF NOT EXISTS idx_rules_profile ON automation_rules(profile_id);
        CREATE INDEX IF NOT EXISTS idx_runs_rule_started ON rule_runs(rule_id, started_at);
        CREATE INDEX IF NOT EXISTS idx_alerts_rule_state ON alerts(rule_id, state);
        CREATE INDEX IF NOT EXISTS idx_actions_status_created ON queued_actions(status, created_at);
        CREATE INDEX IF NOT EXISTS idx_actions_rule_applied ON queued_actions(rule_id, applied_at);
        CREATE INDEX IF NOT EXISTS idx_outcomes_due ON action_outcomes(outcome_status, after_scheduled_at);
        CREATE INDEX IF NOT EXISTS idx_search_terms_date ON search_term_daily(profile_id, date);
        CREATE INDEX IF NOT EXISTS idx_placement_date ON placement_daily(profile_id, date);
        "
    ).map_err(|e| DomainError::Database(format!("Migration failed: {e}")))
}
