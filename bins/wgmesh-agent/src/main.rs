//! wgmesh agent
//!
//! Per-node daemon: registers with the coordinator, brings up the local
//! WireGuard interface and keeps its peer set converged onto the
//! coordinator's view of the mesh.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

mod agent;
mod api;
mod config;
mod endpoint;
mod sync;
#[cfg(test)]
mod testutil;

use agent::Agent;
use config::AgentConfig;
use wgmesh_net::DataPlane;

/// wgmesh - zero-config WireGuard mesh agent
#[derive(Parser)]
#[command(name = "wgmesh-agent")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Config file path
    #[arg(short, long, default_value = "~/.wgmesh/agent.toml")]
    config: PathBuf,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Join the mesh and keep the interface converged
    Start {
        /// Coordinator URL (overrides config)
        #[arg(short, long)]
        server: Option<String>,

        /// Advertise this node as an exit for all traffic
        #[arg(short, long)]
        exit_node: bool,
    },

    /// Generate a key pair and a default config
    Init {
        /// Overwrite an existing config
        #[arg(short, long)]
        force: bool,
    },

    /// Show registration state
    Status,

    /// Show the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    let config_path = expand_path(&cli.config)?;

    match cli.command {
        Commands::Start { server, exit_node } => cmd_start(config_path, server, exit_node).await,
        Commands::Init { force } => cmd_init(config_path, force).await,
        Commands::Status => cmd_status(config_path).await,
        Commands::Config => cmd_config(config_path).await,
    }
}

async fn cmd_start(config_path: PathBuf, server: Option<String>, exit_node: bool) -> Result<()> {
    let mut config = AgentConfig::load_or_create(&config_path).await?;
    if let Some(server) = server {
        config.server.addr = server;
    }
    if exit_node {
        config.interface.exit_node = true;
    }
    config.validate()?;

    let dataplane = create_dataplane()?;
    let agent = Agent::new(config, config_path, dataplane).await?;
    agent.start().await?;

    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    agent.stop().await
}

async fn cmd_init(config_path: PathBuf, force: bool) -> Result<()> {
    if config_path.exists() && !force {
        anyhow::bail!(
            "Config already exists at {:?}. Use --force to overwrite.",
            config_path
        );
    }

    let mut config = AgentConfig::default();
    config.ensure_identity()?;
    config.save(&config_path).await?;

    println!("wgmesh agent initialized");
    println!(
        "Public key: {}",
        config.identity.public_key.as_deref().unwrap_or("")
    );
    println!("Config: {}", config_path.display());
    println!("\nJoin a mesh with: wgmesh-agent start --server <coordinator url>");

    Ok(())
}

async fn cmd_status(config_path: PathBuf) -> Result<()> {
    let config = match AgentConfig::load(&config_path).await {
        Ok(config) => config,
        Err(_) => {
            println!("No config found at {}", config_path.display());
            return Ok(());
        }
    };

    println!("wgmesh agent status");
    println!("===================");
    println!("Coordinator: {}", config.server.addr);
    println!("Interface:   {}", config.interface.name);
    println!(
        "Public key:  {}",
        config.identity.public_key.as_deref().unwrap_or("(none)")
    );
    match (&config.identity.peer_id, &config.identity.assigned_ip) {
        (Some(peer_id), Some(ip)) => {
            println!("Peer id:     {peer_id}");
            println!("Virtual IP:  {ip}");
        }
        _ => println!("Not registered yet"),
    }

    Ok(())
}

async fn cmd_config(config_path: PathBuf) -> Result<()> {
    let config = AgentConfig::load(&config_path).await?;
    print!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}

#[cfg(target_os = "linux")]
fn create_dataplane() -> Result<Arc<dyn DataPlane>> {
    Ok(Arc::new(wgmesh_net::LinuxDataPlane::new()))
}

#[cfg(not(target_os = "linux"))]
fn create_dataplane() -> Result<Arc<dyn DataPlane>> {
    anyhow::bail!("no data plane implementation for this platform")
}

fn expand_path(path: &PathBuf) -> Result<PathBuf> {
    let path_str = path.to_string_lossy();
    if let Some(rest) = path_str.strip_prefix("~/") {
        let home = directories::BaseDirs::new()
            .context("Failed to get home directory")?
            .home_dir()
            .to_path_buf();
        Ok(home.join(rest))
    } else {
        Ok(path.clone())
    }
}
