use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

use server::{app, database};
use shared::config::{load_config, parse_config};

#[derive(Parser, Debug)]
#[command(name = "roster-server", about = "Character roster with a live change feed")]
struct Args {
    /// Path to the TOML configuration file
    #[arg(long, short, env = "ROSTER_CONFIG", default_value = "config.toml")]
    config: PathBuf,
}

fn init_tracing() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn"));

    fmt().with_env_filter(env_filter).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is normal outside development.
    dotenv::dotenv().ok();
    init_tracing();

    let args = Args::parse();
    let config = if args.config.exists() {
        load_config(&args.config.to_string_lossy())
            .with_context(|| format!("Failed to load {}", args.config.display()))?
    } else {
        info!(
            "No config file at {}, using defaults and environment",
            args.config.display()
        );
        parse_config("", |key| std::env::var(key).ok())
            .context("Invalid configuration from environment")?
    };

    let raw_url = config
        .database
        .url
        .as_deref()
        .context("No database URL configured")?;
    let url = database::normalize_database_url(raw_url)?;

    let db = database::connect(&url, config.database.max_connections)
        .await
        .context("Failed to connect to the database")?;
    database::ping(&db)
        .await
        .context("Database did not answer the startup ping")?;
    database::create::create_tables(&db)
        .await
        .context("Failed to create tables")?;

    info!("Starting roster server on {}", config.server.addr());
    app::run(config, db).await
}
