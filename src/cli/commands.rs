use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "adpilot", about = "Rule-driven automation for sponsored ads campaigns")]
pub struct Cli {
    /// Config file (TOML). Falls back to ADPILOT_CONFIG, then built-in defaults.
    #[arg(long, global = true)]
    pub config: Option<String>,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a rule from a JSON definition (inline or @path/to/file.json)
    RuleAdd {
        json: String,
    },
    /// List rules
    Rules {
        #[arg(long)]
        profile: Option<String>,
        /// Only enabled (true) or disabled (false) rules
        #[arg(long)]
        enabled: Option<bool>,
    },
    /// Enable a rule
    RuleEnable {
        id: String,
    },
    /// Disable a rule
    RuleDisable {
        id: String,
        #[arg(long)]
        reason: Option<String>,
    },
    /// Evaluate all enabled rules, or one rule
    Evaluate {
        #[arg(long)]
        rule: Option<String>,
    },
    /// Apply queued actions
    Execute {
        #[arg(long)]
        batch: Option<usize>,
    },
    /// Measure outcomes whose lookback window has elapsed
    Collect {
        #[arg(long, default_value = "100")]
        limit: usize,
    },
    /// Undo an applied action
    Revert {
        action_id: String,
    },
    /// Queue a manual action from JSON (inline or @path/to/file.json)
    Enqueue {
        json: String,
    },
    /// Approve the actions proposed by a suggestion alert
    Approve {
        alert_id: String,
    },
    /// List queued actions
    Actions {
        /// queued, applied, failed, skipped, reverted
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        rule: Option<String>,
        #[arg(long, default_value = "50")]
        limit: usize,
    },
    /// List alerts
    Alerts {
        #[arg(long)]
        rule: Option<String>,
        /// new, acknowledged, muted, resolved
        #[arg(long)]
        state: Option<String>,
        #[arg(long, default_value = "50")]
        limit: usize,
    },
    /// Acknowledge an alert
    AlertAck {
        id: String,
    },
    /// Mute an alert
    AlertMute {
        id: String,
    },
    /// Show rule run history
    Runs {
        #[arg(long)]
        rule: Option<String>,
        #[arg(long, default_value = "20")]
        limit: usize,
    },
    /// Show measured and pending outcomes
    Outcomes {
        #[arg(long, default_value = "50")]
        limit: usize,
    },
    /// Exclude an entity from automation
    Protect {
        /// campaign, ad_group, keyword, target
        entity_type: String,
        entity_id: String,
        #[arg(long)]
        reason: Option<String>,
    },
    /// Remove an automation exclusion
    Unprotect {
        entity_type: String,
        entity_id: String,
    },
    /// List protected entities
    Protected,
    /// Set a user's plan tier (free, pro, agency)
    PlanSet {
        user_id: String,
        plan: String,
    },
    /// Import performance metrics from a JSON document (inline or @path/to/file.json)
    Import {
        json: String,
    },
    /// Run evaluate, execute and collect on a fixed interval
    Schedule {
        /// Seconds between passes
        #[arg(long, default_value = "300")]
        every: u64,
    },
}
