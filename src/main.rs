//! Bank Ledger - transfer service
//!
//! ```text
//! ┌──────────┐    ┌──────────┐    ┌──────────────┐    ┌────────────┐
//! │  Config  │───▶│ Gateway  │───▶│TransferEngine│───▶│ PostgreSQL │
//! │  (YAML)  │    │  (axum)  │    │ (one tx each)│    │  (sqlx)    │
//! └──────────┘    └──────────┘    └──────────────┘    └────────────┘
//! ```
//!
//! Usage: `bank_ledger [--env dev] [--port 8080]`

use std::sync::Arc;

use anyhow::Context;

use bank_ledger::config::AppConfig;
use bank_ledger::db::{Database, schema};
use bank_ledger::gateway::{self, state::AppState};
use bank_ledger::ledger::{PgLedger, TransferEngine};

fn get_env() -> String {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if (args[i] == "--env" || args[i] == "-e") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }
    "dev".to_string()
}

/// Get port override from command line (--port argument)
fn get_port_override() -> Option<u16> {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if args[i] == "--port" && i + 1 < args.len() {
            return args[i + 1].parse().ok();
        }
    }
    None
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = get_env();
    let mut app_config = AppConfig::load(&env)?;
    if let Some(port) = get_port_override() {
        app_config.gateway.port = port;
    }
    let _log_guard = bank_ledger::logging::init_logging(&app_config);

    tracing::info!("Starting Bank Ledger in {} mode", env);

    let db = Database::connect(&app_config.database)
        .await
        .context("Failed to connect to PostgreSQL")?;
    if app_config.database.init_schema {
        schema::init_schema(db.pool()).await?;
    }

    let source = Arc::new(PgLedger::new(db.pool().clone()));
    let engine = TransferEngine::with_config(source, app_config.ledger.clone());
    tracing::info!(
        allow_overdraft = app_config.ledger.allow_overdraft,
        transfer_timeout_ms = app_config.gateway.transfer_timeout_ms,
        "Transfer engine initialized"
    );

    let state = Arc::new(
        AppState::new(Arc::new(engine))
            .with_transfer_timeout_ms(app_config.gateway.transfer_timeout_ms),
    );

    gateway::run_server(&app_config.gateway, state).await
}
