pub mod cli;
pub mod commands;
pub mod config;
pub mod database;
pub mod error;
pub mod places;
pub mod sync;
pub mod youtube;

use anyhow::Context;
use clap::Parser;
use cli::Cli;
use commands::AppState;
use config::AppConfig;
use database::Database;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = AppConfig::load(cli.config.as_deref(), cli.db.clone())?;

    // Initialize database
    let db_path = config.database_path();
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create data directory {}", parent.display()))?;
    }
    let db = Arc::new(Database::new(&db_path)?);
    tracing::debug!(path = %db_path.display(), "database ready");

    let state = AppState::new(db, config);
    cli::dispatch(&state, cli.command).await
}

/// Logs go to stderr so command output on stdout stays machine-readable.
/// `RUST_LOG` overrides the default filter.
fn init_logging(verbose: bool) {
    let default_filter = if verbose {
        "foodie_map_lib=debug"
    } else {
        "foodie_map_lib=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Load a value from the .env file by key name
pub fn load_env_value(project_dir: &std::path::Path, key: &str) -> Option<String> {
    let env_path = project_dir.join(".env");
    let prefix = format!("{}=", key);
    let content = std::fs::read_to_string(&env_path).ok()?;
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.starts_with('#'))
        .filter_map(|line| line.strip_prefix(&prefix))
        .map(|value| value.trim().trim_matches('"').trim_matches('\''))
        .find(|value| !value.is_empty())
        .map(str::to_string)
}
