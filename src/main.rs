//! # Docsite Main Entry Point
//!
//! This is the main entry point for the docsite backend service.

use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use docsite::{
    config::ConfigLoader,
    db,
    events::BroadcastEventBus,
    repositories::OAuthStateRepository,
    server::{AppState, run_server},
    telemetry,
};
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(name = "docsite", version, about = "Docsite backend service")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Apply migrations and serve the HTTP API (default)
    Serve,
    /// Apply pending database migrations and exit
    Migrate,
    /// Delete expired OAuth state tokens and exit
    PruneStates,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration from layered env files and variables
    let config_loader = ConfigLoader::new();
    let config = config_loader.load()?;

    telemetry::init_tracing(&config)?;

    info!(profile = %config.profile, "Loaded configuration");
    if let Ok(redacted_json) = config.redacted_json() {
        tracing::debug!(config = %redacted_json, "Effective configuration");
    }

    let db = db::init_pool(&config)
        .await
        .context("initializing database connection pool")?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Migrate => db::run_migrations(&db).await,
        Command::PruneStates => {
            let removed = OAuthStateRepository::new(Arc::new(db))
                .cleanup_expired(Utc::now())
                .await
                .context("pruning expired OAuth states")?;
            info!(removed, "Pruned expired OAuth states");
            Ok(())
        }
        Command::Serve => {
            db::run_migrations(&db).await?;

            if config.webhook_secret().is_none() {
                warn!(
                    "WEBHOOK_GITHUB_SECRET is not set; GitHub webhook signatures will NOT be verified"
                );
            }

            let config = Arc::new(config);
            let events = Arc::new(BroadcastEventBus::default());
            let state = AppState::with_remote_clients(Arc::clone(&config), Arc::new(db), events)
                .context("building provider clients")?;

            run_server(&config, state).await
        }
    }
}
