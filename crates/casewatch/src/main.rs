//! casewatch - Entry Point
//!
//! Polls the forensics backend, applies live invalidations and renders the
//! dashboard until interrupted.

use anyhow::Result;
use casewatch::app::OutputFormat;
use casewatch::config::{CONFIG_ENV, DEFAULT_CONFIG_PATH};
use clap::Parser;
use tracing::info;

/// casewatch live forensics dashboard
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via CASEWATCH_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,

    /// Render a single frame once every widget has settled, then exit
    #[arg(long)]
    once: bool,

    /// Emit frames as JSON instead of text
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize TLS crypto provider (must be before any wss:// connection)
    casewatch_live::init_crypto();

    let args = Args::parse();

    casewatch_telemetry::init_logging()?;

    info!("Starting casewatch v{}", env!("CARGO_PKG_VERSION"));

    // CLI arg > CASEWATCH_CONFIG env var > default
    let config_path = args
        .config
        .or_else(|| std::env::var(CONFIG_ENV).ok())
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

    info!(config_path = %config_path, "Loading configuration");
    let config = casewatch::AppConfig::load(&config_path)?;
    info!(
        backend = %config.backend.base_url,
        live = config.live.enabled,
        "Configuration loaded"
    );

    let format = if args.json {
        OutputFormat::Json
    } else {
        OutputFormat::Text
    };

    let app = casewatch::Application::new(config)?;

    if args.once {
        println!("{}", app.run_once(format).await?);
    } else {
        app.run(format).await?;
    }

    Ok(())
}
