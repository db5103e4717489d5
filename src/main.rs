//! perpilot - headless autonomous perpetual-futures trading agent.
//!
//! Runs the full closed loop: perception, strategist, trader, risk,
//! execution and account sync, until a Ctrl+C triggers the graceful
//! shutdown sequence.

use anyhow::Result;
use clap::Parser;
use perpilot::application::system::Application;
use perpilot::config::Config;
use tracing::{Level, info};
use tracing_subscriber::prelude::*;

#[derive(Parser, Debug)]
#[command(name = "perpilot", about = "Autonomous LLM-driven perp trading agent")]
struct Cli {
    /// Path to an env file loaded before configuration.
    #[arg(long, default_value = ".env")]
    env_file: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    dotenvy::from_path(&cli.env_file).ok();

    let stdout_layer = tracing_subscriber::fmt::layer().with_target(false);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with(stdout_layer)
        .init();

    info!("perpilot {} starting", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env()?;
    info!(
        symbols = ?config.symbols,
        live = config.exchange.enable_trading,
        model = %config.model.model_name,
        "Configuration loaded"
    );

    let app = Application::build(config).await?;
    let handle = app.start().await?;
    info!("Trading loops running. Press Ctrl+C to shut down.");

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");

    handle.stop().await;
    app.close().await;
    info!("Goodbye");
    Ok(())
}
