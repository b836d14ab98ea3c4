//! ASC Web Server
//!
//! Automobile service center web application.

use anyhow::Context;
use asc_core::{init_logging, AscConfig};
use asc_web::{AscServerBuilder, WebConfig};
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, warn};

/// ASC Web Server - automobile service center web application
#[derive(Parser)]
#[command(name = "asc-web")]
#[command(about = "Automobile service center web application")]
#[command(version)]
struct Args {
    /// Server host to bind to
    #[arg(long)]
    host: Option<String>,

    /// Server port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Enable development mode
    #[arg(long)]
    dev: bool,

    /// Settings file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Identity database URL, e.g. sqlite://asc.db
    #[arg(long)]
    database_url: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load environment variables
    dotenvy::dotenv().ok();

    // Environment first, command line wins
    let mut config = WebConfig::from_env();
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    config.dev_mode |= args.dev;
    if args.database_url.is_some() {
        config.database_url = args.database_url;
    }

    let config_path = args
        .config
        .or_else(|| config.config_path.as_ref().map(PathBuf::from));

    let settings =
        AscConfig::load(config_path.as_deref()).context("Failed to load application settings")?;

    init_logging(&settings.logging)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    settings.validate().context("Invalid application settings")?;
    for warning in settings.warnings() {
        warn!("{}", warning);
    }

    if let Some(db_url) = &config.database_url {
        info!("Identity database: {}", db_url);
    }

    let server = AscServerBuilder::new()
        .config(config)
        .settings(settings)
        .build()
        .await
        .context("Failed to build server")?;

    server.start().await.context("Server failed")?;

    info!("Server shut down gracefully");
    Ok(())
}
