mod api;
mod cli;
mod router;
mod startup;
mod state;

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::info;

use deadcheck_core::{Config, SystemTimeSource, TimeSource};
use deadcheck_monitor::CheckDefinition;

use crate::cli::{Cli, Command, Maintenance};
use crate::state::AppState;

async fn serve(config: Config, dry_run: bool) -> anyhow::Result<()> {
    config.log_summary();

    let definitions = CheckDefinition::all_from_config(&config)?;
    let clock: Arc<dyn TimeSource> = Arc::new(SystemTimeSource);
    let checks = startup::build_monitored_checks(definitions, clock.clone(), dry_run).await?;
    startup::arm_all(&checks, config.server.provider_timeout).await?;

    let shutdown = CancellationToken::new();
    let state = Arc::new(AppState {
        checks,
        clock,
        provider_timeout: config.server.provider_timeout,
        shutdown: shutdown.clone(),
    });
    let app = router::build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.server.bind_address)
        .await
        .with_context(|| format!("binding {}", config.server.bind_address))?;
    info!("Server listening on http://{}", config.server.bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            os_signal().await;
            info!("shutdown signal received");
            shutdown.cancel();
        })
        .await?;

    info!("server stopped");
    Ok(())
}

/// Wait for SIGINT or SIGTERM (Unix) or Ctrl+C (cross-platform fallback).
async fn os_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigint = signal(SignalKind::interrupt()).expect("failed to register SIGINT");
        let mut sigterm = signal(SignalKind::terminate()).expect("failed to register SIGTERM");
        tokio::select! {
            _ = sigint.recv() => {}
            _ = sigterm.recv() => {}
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to listen for ctrl_c");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let config = cli::load_config(&cli)?;

    match cli.command() {
        Command::Serve => serve(config, cli.dry_run).await?,
        Command::Next => cli::print_next(&config)?,
        Command::Resolve { check_id } => {
            cli::run_maintenance(&config, &check_id, Maintenance::Resolve, cli.dry_run).await?
        }
        Command::Teardown { check_id } => {
            cli::run_maintenance(&config, &check_id, Maintenance::Teardown, cli.dry_run).await?
        }
    }

    Ok(())
}
