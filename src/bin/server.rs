//! toolpilot API server
//!
//! Initializes the agent and serves the HTTP surface.

use anyhow::Context;
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use toolpilot::agent::Agent;
use toolpilot::config::{load_config, load_config_from_path, validate_config};
use toolpilot::logging::init_logging;
use toolpilot::server::{serve, AppState};

#[derive(Parser)]
#[command(name = "toolpilot-server", version, about = "toolpilot HTTP API server")]
struct Args {
    /// Bind address
    #[arg(long, default_value = "127.0.0.1")]
    bind: String,

    /// Port
    #[arg(long, short, default_value_t = 8000)]
    port: u16,

    /// Path to the configuration file
    #[arg(long, short)]
    config: Option<PathBuf>,
}

async fn run(args: Args) -> anyhow::Result<()> {
    let config = match &args.config {
        Some(path) => load_config_from_path(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => load_config().context("loading config")?,
    };

    init_logging(&config.logging).ok();

    let validation = validate_config(&config);
    for warning in &validation.warnings {
        tracing::warn!("config {}: {}", warning.path, warning.message);
    }
    if !validation.valid {
        for error in &validation.errors {
            tracing::error!("config {}: {}", error.path, error.message);
        }
        anyhow::bail!("invalid configuration, refusing to serve");
    }

    let mut agent = Agent::new(config)?;
    agent.initialize().await.context("initializing agent")?;
    info!("agent initialized with {} tools", agent.list_tools().await.len());

    let addr: SocketAddr = format!("{}:{}", args.bind, args.port)
        .parse()
        .context("invalid bind address")?;

    let state = AppState::new(Arc::new(agent));
    serve(state, addr).await.context("running server")?;
    Ok(())
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    if let Err(e) = run(args).await {
        eprintln!("fatal: {:#}", e);
        std::process::exit(1);
    }
}
