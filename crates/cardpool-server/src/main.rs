//! `cardpool-server` - the card-pool gateway binary.
//!
//! Usage:
//!   cardpool-server [-c <config.toml>] [--listen <addr>] [--database <path>]

use anyhow::Context;
use cardpool_allocation::{AuditLogWriter, BackgroundQueue};
use cardpool_network::CardPoolClient;
use cardpool_server::{ApiKeyGate, AppState, ServerConfig, build_router};
use cardpool_storage::Database;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// Card-pool gateway
#[derive(Parser, Debug)]
#[command(name = "cardpool-server", version, about = "Card-pool gateway")]
struct Cli {
    /// Path to the TOML config file
    #[arg(short = 'c', long = "config", env = "CARDPOOL_CONFIG")]
    config: Option<PathBuf>,

    /// Listen address, overrides the config file
    #[arg(long = "listen")]
    listen: Option<String>,

    /// SQLite database path, overrides the config file
    #[arg(long = "database")]
    database: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let dotenv = dotenvy::dotenv();
    let cli = Cli::parse();

    let mut config = ServerConfig::load(cli.config.as_deref())?;
    config.apply_env()?;
    if let Some(listen) = cli.listen {
        config.listen = listen;
    }
    if let Some(database) = cli.database {
        config.database.path = database;
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_level.as_str().into()),
        )
        .init();

    if let Ok(path) = dotenv {
        info!("Loaded environment from {}", path.display());
    }
    config.validate()?;

    let db = Database::new(config.database_config())
        .await
        .context("failed to open database")?;

    let queue = BackgroundQueue::start(db.pool().clone(), config.background_config());
    let audit = AuditLogWriter::new(queue.clone());

    let client = CardPoolClient::new(config.client_config())?.with_observer(Arc::new(audit.clone()));
    info!("Remote card pool at {}", config.api.base_url);

    let state = AppState::new(db.pool().clone(), Arc::new(client), audit);
    let app = build_router(state, ApiKeyGate::new(config.auth.accepted_keys.clone()));

    let listener = tokio::net::TcpListener::bind(&config.listen)
        .await
        .with_context(|| format!("failed to bind {}", config.listen))?;
    info!("Card-pool gateway listening on {}", config.listen);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Draining background queue");
    if let Err(e) = queue.flush().await {
        warn!(error = %e, "Background queue did not drain");
    }
    let dead = queue.dead_letters();
    if !dead.is_empty() {
        warn!(count = dead.len(), "Background jobs were dead-lettered");
    }
    db.close().await;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}
