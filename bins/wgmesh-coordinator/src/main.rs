//! wgmesh coordinator daemon
//!
//! Central control plane for the overlay: owns the peer registry and the
//! address plan, serves the agent HTTP API and runs the liveness sweeper.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

mod config;

use config::CoordinatorConfig;
use wgmesh_coord::{router, sweeper, ApiState, PeerStore, Registry};

/// wgmesh coordination server
#[derive(Parser)]
#[command(name = "wgmesh-coordinator")]
#[command(author, version, about)]
struct Cli {
    /// Config file path
    #[arg(short, long, default_value = "~/.wgmesh/coordinator.toml")]
    config: PathBuf,

    /// Listen address (overrides config)
    #[arg(short, long)]
    listen: Option<String>,

    /// Overlay network CIDR (overrides config)
    #[arg(short, long)]
    network: Option<String>,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
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
    let mut config = CoordinatorConfig::load_or_create(&config_path).await?;

    if let Some(listen) = cli.listen {
        config.http.listen_addr = listen;
    }
    if let Some(network) = cli.network {
        config.network.cidr = network;
    }
    config.validate()?;

    if config.ensure_identity()? {
        config.save(&config_path).await?;
        info!("generated server key pair");
    }
    let server_public_key = config
        .identity
        .public_key
        .clone()
        .expect("identity ensured above");

    let store_path = config.store_path(&config_path);
    let store = PeerStore::new(&store_path).await?;
    let registry = Arc::new(Registry::new(&config.network.cidr, store)?);
    let restored = registry.restore().await?;

    info!("coordinator starting on {}", config.http.listen_addr);
    info!("server public key: {server_public_key}");
    info!("network: {}", config.network.cidr);
    info!("store: {} ({restored} peers restored)", store_path.display());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper_handle = sweeper::spawn(
        registry.clone(),
        Duration::from_secs(config.timing.sweep_interval_secs),
        Duration::from_secs(config.timing.heartbeat_timeout_secs),
        shutdown_rx,
    );

    let app = router(ApiState {
        registry,
        server_public_key,
    });
    let listener = tokio::net::TcpListener::bind(&config.http.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.http.listen_addr))?;

    let shutdown = async {
        let _ = tokio::signal::ctrl_c().await;
        info!("received shutdown signal");
    };
    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
    {
        error!("server error: {e}");
    }

    let _ = shutdown_tx.send(true);
    let _ = sweeper_handle.await;
    info!("coordinator stopped");

    Ok(())
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
