//! CLI argument parsing and subcommand dispatch.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};

use deadcheck_core::{Config, SystemTimeSource, TimeSource};
use deadcheck_monitor::{CallContext, CheckDefinition};
use deadcheck_schedule::next_occurrence;

use crate::startup::build_monitored_checks;

/// Dead man's switch for scheduled jobs, escalating through PagerDuty.
#[derive(Parser, Debug)]
#[command(name = "deadcheck", version, about)]
pub struct Cli {
    /// Path to the YAML config file.
    #[arg(long, short, global = true, env = "DEADCHECK_CONFIG", default_value = "deadcheck.yaml")]
    pub config: PathBuf,

    /// Use an in-memory alert provider instead of PagerDuty.
    #[arg(long, global = true, env = "DEADCHECK_DRY_RUN")]
    pub dry_run: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Arm every check and serve the check-in API (default).
    Serve,
    /// Print each check's next expected check-in without contacting the provider.
    Next,
    /// Resolve a check's standing incident.
    Resolve { check_id: String },
    /// Resolve a check's incident and delete its provider service.
    Teardown { check_id: String },
}

impl Cli {
    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Serve)
    }
}

pub fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    deadcheck_core::config::load_dotenv();
    let config = Config::load(&cli.config)
        .with_context(|| format!("loading config from {}", cli.config.display()))?;
    Ok(config)
}

/// `deadcheck next`
pub fn print_next(config: &Config) -> anyhow::Result<()> {
    let now = SystemTimeSource.now();
    for definition in CheckDefinition::all_from_config(config)? {
        let (occurrence, wait) = next_occurrence(now, &definition.schedule)
            .with_context(|| format!("evaluating check '{}'", definition.id))?;
        println!(
            "{:<24} {:<13} {}  window {} .. {}  (in {})",
            definition.id,
            definition.schedule.kind(),
            occurrence.instant.to_rfc3339(),
            occurrence.window_start.to_rfc3339(),
            occurrence.window_end.to_rfc3339(),
            deadcheck_core::format_duration(wait),
        );
    }
    Ok(())
}

/// What a maintenance subcommand does to the check's provider objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Maintenance {
    Resolve,
    Teardown,
}

/// `deadcheck resolve <id>` and `deadcheck teardown <id>`
pub async fn run_maintenance(
    config: &Config,
    check_id: &str,
    action: Maintenance,
    dry_run: bool,
) -> anyhow::Result<()> {
    let check = config
        .check(check_id)
        .with_context(|| format!("no check with id '{check_id}'"))?;
    let definition = CheckDefinition::from_config(config, check)?;
    let clock: Arc<dyn TimeSource> = Arc::new(SystemTimeSource);
    let monitored = build_monitored_checks(vec![definition], clock, dry_run).await?;

    let ctx = CallContext::background().with_timeout(config.server.provider_timeout);
    for check in &monitored {
        match action {
            Maintenance::Resolve => {
                let handle = check.orchestrator.resolve(&ctx, &check.definition).await?;
                println!("resolved incident {} on service {}", handle.incident.id, handle.service.name);
            }
            Maintenance::Teardown => {
                check.orchestrator.teardown(&ctx, &check.definition).await?;
                println!("removed service for check {}", check.definition.id);
            }
        }
    }
    Ok(())
}
