use adpilot::application::actions::ManualAction;
use adpilot::application::rules::NewRule;
use adpilot::cli::commands::{Cli, Commands};
use adpilot::config::AutomationConfig;
use adpilot::domain::ports::action_queue::ActionFilter;
use adpilot::domain::ports::alert_repository::AlertFilter;
use adpilot::domain::values::entity_type::{EntityRef, EntityType};
use adpilot::domain::values::plan_tier::PlanTier;
use adpilot::infrastructure::sqlite::metrics_store::MetricsImport;
use adpilot::AdPilot;
use chrono::Utc;
use clap::Parser;
use serde::Serialize;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

#[tokio::main]
async fn main() {
    let filter = match "adpilot=info".parse() {
        Ok(directive) => EnvFilter::from_default_env().add_directive(directive),
        Err(_) => EnvFilter::from_default_env(),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match AutomationConfig::resolve(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "configuration rejected");
            std::process::exit(1);
        }
    };

    let pilot = match AdPilot::new(config) {
        Ok(pilot) => pilot,
        Err(e) => {
            tracing::error!(error = %e, "failed to initialize adpilot");
            std::process::exit(1);
        }
    };

    if let Err(e) = run_command(pilot, cli.command).await {
        tracing::error!(error = %e, "command failed");
        std::process::exit(1);
    }
}

fn print_json<T: Serialize>(value: &T) -> CliResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Inline JSON, or `@path` to read it from a file.
fn read_json_arg(arg: &str) -> CliResult<String> {
    match arg.strip_prefix('@') {
        Some(path) => Ok(std::fs::read_to_string(path)?),
        None => Ok(arg.to_string()),
    }
}

fn entity_ref(entity_type: &str, entity_id: String) -> CliResult<EntityRef> {
    let entity_type: EntityType = entity_type.parse().map_err(|e: String| e)?;
    Ok(EntityRef::new(entity_type, entity_id))
}

async fn run_command(pilot: AdPilot, cmd: Commands) -> CliResult<()> {
    match cmd {
        Commands::RuleAdd { json } => {
            let new_rule: NewRule = serde_json::from_str(&read_json_arg(&json)?)?;
            print_json(&pilot.rule_add(new_rule)?)?;
        }
        Commands::Rules { profile, enabled } => {
            print_json(&pilot.rules(profile, enabled)?)?;
        }
        Commands::RuleEnable { id } => {
            print_json(&pilot.rule_enable(&id)?)?;
        }
        Commands::RuleDisable { id, reason } => {
            print_json(&pilot.rule_disable(&id, reason.as_deref())?)?;
        }
        Commands::Evaluate { rule } => match rule {
            Some(rule_id) => print_json(&pilot.evaluate_rule(&rule_id, Utc::now()).await?)?,
            None => print_json(&pilot.evaluate(Utc::now()).await?)?,
        },
        Commands::Execute { batch } => {
            print_json(&pilot.execute(batch).await?)?;
        }
        Commands::Collect { limit } => {
            print_json(&pilot.collect(Utc::now(), limit)?)?;
        }
        Commands::Revert { action_id } => {
            print_json(&pilot.revert(&action_id).await?)?;
        }
        Commands::Enqueue { json } => {
            let manual: ManualAction = serde_json::from_str(&read_json_arg(&json)?)?;
            print_json(&pilot.enqueue(manual)?)?;
        }
        Commands::Approve { alert_id } => {
            print_json(&pilot.approve(&alert_id)?)?;
        }
        Commands::Actions { status, rule, limit } => {
            let status = status.map(|s| s.parse()).transpose().map_err(|e: String| e)?;
            print_json(&pilot.actions(&ActionFilter {
                status,
                rule_id: rule,
                limit: Some(limit),
            })?)?;
        }
        Commands::Alerts { rule, state, limit } => {
            let state = state.map(|s| s.parse()).transpose().map_err(|e: String| e)?;
            print_json(&pilot.alerts(&AlertFilter {
                rule_id: rule,
                state,
                limit: Some(limit),
            })?)?;
        }
        Commands::AlertAck { id } => {
            print_json(&pilot.alert_ack(&id)?)?;
        }
        Commands::AlertMute { id } => {
            print_json(&pilot.alert_mute(&id)?)?;
        }
        Commands::Runs { rule, limit } => {
            print_json(&pilot.runs(rule.as_deref(), limit)?)?;
        }
        Commands::Outcomes { limit } => {
            print_json(&pilot.outcomes(limit)?)?;
        }
        Commands::Protect {
            entity_type,
            entity_id,
            reason,
        } => {
            print_json(&pilot.protect(entity_ref(&entity_type, entity_id)?, reason)?)?;
        }
        Commands::Unprotect {
            entity_type,
            entity_id,
        } => {
            let removed = pilot.unprotect(&entity_ref(&entity_type, entity_id)?)?;
            print_json(&serde_json::json!({ "removed": removed }))?;
        }
        Commands::Protected => {
            print_json(&pilot.protected()?)?;
        }
        Commands::PlanSet { user_id, plan } => {
            let tier: PlanTier = plan.parse().map_err(|e: String| e)?;
            pilot.plan_set(&user_id, tier)?;
            print_json(&serde_json::json!({ "user_id": user_id, "plan": tier }))?;
        }
        Commands::Import { json } => {
            let doc: MetricsImport = serde_json::from_str(&read_json_arg(&json)?)?;
            print_json(&pilot.import_metrics(&doc)?)?;
        }
        Commands::Schedule { every } => {
            schedule(&pilot, every).await;
        }
    }
    Ok(())
}

/// Evaluate, execute and collect on every tick. Each job stands alone: a
/// failing job is logged and the loop carries on.
async fn schedule(pilot: &AdPilot, every_secs: u64) {
    let mut interval = tokio::time::interval(Duration::from_secs(every_secs.max(1)));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    tracing::info!(every_secs, "scheduler started");

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("scheduler stopping");
                return;
            }
        }

        if let Err(e) = pilot.evaluate(Utc::now()).await {
            tracing::error!(job = "evaluate", error = %e, "scheduled job failed");
        }
        if let Err(e) = pilot.execute(None).await {
            tracing::error!(job = "execute", error = %e, "scheduled job failed");
        }
        let limit = pilot.config().batch_size.max(100);
        if let Err(e) = pilot.collect(Utc::now(), limit) {
            tracing::error!(job = "collect", error = %e, "scheduled job failed");
        }
    }
}
