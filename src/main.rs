//! craft-runner service entry point

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use craft_runner::config::validate_config;
use craft_runner::{
    Config, HttpServerHandle, LifecycleOrchestrator, ProcessSupervisor, ServerRegistry,
};

/// Supervise game server processes and serve their consoles over HTTP.
#[derive(Debug, Parser)]
#[command(name = "craft-runner", version, about)]
struct Cli {
    /// Config file (JSON, or YAML for .yaml/.yml). Defaults apply when omitted.
    #[arg(short, long, env = "CRAFT_RUNNER_CONFIG")]
    config: Option<PathBuf>,

    /// Override the servers directory
    #[arg(long, env = "CRAFT_RUNNER_SERVERS_DIR")]
    servers_dir: Option<PathBuf>,

    /// Override the HTTP bind address
    #[arg(long)]
    address: Option<String>,

    /// Override the HTTP port
    #[arg(short, long)]
    port: Option<u16>,
}

impl Cli {
    fn load_config(&self) -> craft_runner::Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::from_file(path)?,
            None => Config::default(),
        };

        if let Some(dir) = &self.servers_dir {
            config.servers_dir = dir.clone();
        }
        if let Some(address) = &self.address {
            config.http.address = address.clone();
        }
        if let Some(port) = self.port {
            config.http.port = port;
        }

        validate_config(&config)?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("craft_runner=info,actix_web=info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    let cli = Cli::parse();
    let config = cli.load_config()?;
    tracing::info!(servers_dir = %config.servers_dir.display(), "Starting craft-runner");

    let registry = Arc::new(ServerRegistry::open(&config.servers_dir)?);
    let loaded = registry.load()?;
    tracing::info!(servers = loaded, "Loaded server registry");

    let supervisor = Arc::new(ProcessSupervisor::new(config.supervisor.clone()));
    let orchestrator = Arc::new(LifecycleOrchestrator::new(registry, supervisor));

    let http = HttpServerHandle::start(Arc::clone(&orchestrator), &config.http)?;

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown requested");

    http.shutdown().await;
    if let Err(e) = orchestrator.shutdown().await {
        tracing::error!(error = %e, "Some servers did not stop cleanly");
    }

    tracing::info!("craft-runner stopped");
    Ok(())
}
