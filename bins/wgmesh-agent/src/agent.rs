//! Agent runtime
//!
//! Registers with the coordinator, brings the data plane up on the
//! assigned address and keeps two periodic tasks running: heartbeats and
//! peer sync. Both tasks watch a shutdown channel; stop() signals it,
//! joins them and tears the interface down, without touching the network
//! again so shutdown cannot hang on an unreachable coordinator.

use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use wgmesh_net::DataPlane;
use wgmesh_proto::RegisterRequest;

use crate::api::CoordinatorClient;
use crate::config::AgentConfig;
use crate::endpoint;
use crate::sync::{sync_once, Reconciler};

/// The per-node mesh agent.
pub struct Agent {
    config: Mutex<AgentConfig>,
    config_path: PathBuf,
    client: CoordinatorClient,
    dataplane: Arc<dyn DataPlane>,
    reconciler: Arc<Reconciler>,
    shutdown_tx: watch::Sender<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Agent {
    /// Create an agent. Generates and persists a key pair on first run.
    pub async fn new(
        mut config: AgentConfig,
        config_path: PathBuf,
        dataplane: Arc<dyn DataPlane>,
    ) -> Result<Self> {
        if config.ensure_identity()? {
            config.save(&config_path).await?;
            info!("generated WireGuard key pair");
        }

        let client = CoordinatorClient::new(
            &config.server.addr,
            Duration::from_secs(config.timing.http_timeout_secs),
        )?;
        let reconciler = Arc::new(Reconciler::new(dataplane.clone()));
        let (shutdown_tx, _) = watch::channel(false);

        Ok(Self {
            config: Mutex::new(config),
            config_path,
            client,
            dataplane,
            reconciler,
            shutdown_tx,
            tasks: Mutex::new(Vec::new()),
        })
    }

    /// Register, bring the interface up and start the periodic tasks.
    ///
    /// Registration failure is fatal; the agent cannot participate in the
    /// mesh without an assigned address.
    pub async fn start(&self) -> Result<()> {
        let (request, private_key, interface, timing) = {
            let config = self.config.lock().await;
            let public_key = config
                .identity
                .public_key
                .clone()
                .expect("identity ensured in new()");
            let private_key = config
                .identity
                .private_key
                .clone()
                .expect("identity ensured in new()");

            let request = RegisterRequest {
                public_key,
                hostname: local_hostname(),
                os: std::env::consts::OS.to_string(),
                endpoint: endpoint::detect(&config.server.addr, config.interface.listen_port)
                    .await
                    .unwrap_or_default(),
                request_ip: true,
                exit_node: config.interface.exit_node,
                allowed_ips: Vec::new(),
            };
            (
                request,
                private_key,
                config.interface.clone(),
                config.timing.clone(),
            )
        };

        let registration = self
            .client
            .register(&request)
            .await
            .context("failed to register with coordinator")?;
        let assigned_ip: Ipv4Addr = registration
            .assigned_ip
            .parse()
            .context("coordinator returned an unusable address")?;

        info!(
            peer_id = %registration.peer_id,
            ip = %registration.assigned_ip,
            network = %registration.network_cidr,
            "registered with coordinator"
        );

        // Persist the assigned identity; the same values come back on
        // every re-registration, so overwriting is harmless.
        {
            let mut config = self.config.lock().await;
            config.identity.peer_id = Some(registration.peer_id.clone());
            config.identity.assigned_ip = Some(registration.assigned_ip.clone());
            if let Err(e) = config.save(&self.config_path).await {
                warn!(error = %e, "failed to save config");
            }
        }

        self.dataplane
            .create(&interface.name, assigned_ip)
            .await
            .context("failed to create interface")?;
        self.dataplane
            .configure(&private_key, interface.listen_port)
            .await
            .context("failed to configure interface")?;

        if let Err(e) = sync_once(&self.client, &registration.peer_id, &self.reconciler).await {
            warn!(error = %e, "initial peer sync failed");
        }
        if let Ok(stats) = self.dataplane.stats().await {
            info!(interface = %stats.name, peers = stats.peers.len(), "interface up");
        }

        let mut tasks = self.tasks.lock().await;
        tasks.push(self.spawn_heartbeat(
            registration.peer_id.clone(),
            interface.listen_port,
            Duration::from_secs(timing.heartbeat_interval_secs),
        ));
        tasks.push(self.spawn_sync(
            registration.peer_id,
            Duration::from_secs(timing.sync_interval_secs),
        ));

        info!("agent started");
        Ok(())
    }

    fn spawn_heartbeat(
        &self,
        peer_id: String,
        listen_port: u16,
        interval: Duration,
    ) -> JoinHandle<()> {
        let client = self.client.clone();
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            return;
                        }
                    }
                    _ = ticker.tick() => {
                        let endpoint = endpoint::detect(client.server_addr(), listen_port).await;
                        if let Err(e) = client.heartbeat(&peer_id, endpoint).await {
                            warn!(error = %e, "heartbeat failed");
                        }
                    }
                }
            }
        })
    }

    fn spawn_sync(&self, peer_id: String, interval: Duration) -> JoinHandle<()> {
        let client = self.client.clone();
        let reconciler = self.reconciler.clone();
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            return;
                        }
                    }
                    _ = ticker.tick() => {
                        if let Err(e) = sync_once(&client, &peer_id, &reconciler).await {
                            warn!(error = %e, "peer sync failed");
                        }
                    }
                }
            }
        })
    }

    /// Stop the periodic tasks and tear the interface down.
    pub async fn stop(&self) -> Result<()> {
        info!("stopping agent");
        let _ = self.shutdown_tx.send(true);

        let mut tasks = self.tasks.lock().await;
        for task in tasks.drain(..) {
            let _ = task.await;
        }

        if let Err(e) = self.dataplane.destroy().await {
            warn!(error = %e, "failed to destroy interface");
        }

        info!("agent stopped");
        Ok(())
    }
}

fn local_hostname() -> String {
    hostname::get()
        .map(|h| h.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wgmesh_net::MemoryDataPlane;

    use crate::testutil::TestCoordinator;

    async fn test_agent(
        coordinator: &TestCoordinator,
        dir: &tempfile::TempDir,
        name: &str,
    ) -> (Agent, Arc<MemoryDataPlane>) {
        let mut config = AgentConfig::default();
        config.server.addr = coordinator.base.clone();
        // Fast ticks so tests observe periodic behavior quickly.
        config.timing.heartbeat_interval_secs = 1;
        config.timing.sync_interval_secs = 1;

        let plane = Arc::new(MemoryDataPlane::new());
        let agent = Agent::new(config, dir.path().join(format!("{name}.toml")), plane.clone())
            .await
            .unwrap();
        (agent, plane)
    }

    #[tokio::test]
    async fn test_agent_full_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let coordinator = TestCoordinator::start(&dir.path().join("peers.json")).await;

        let (agent, plane) = test_agent(&coordinator, &dir, "a").await;
        agent.start().await.unwrap();

        // Interface came up on the assigned address.
        assert_eq!(plane.address().await, Some("10.100.0.1".parse().unwrap()));

        // Registration was persisted for the next run.
        let saved = AgentConfig::load(&dir.path().join("a.toml")).await.unwrap();
        assert!(saved.identity.peer_id.is_some());
        assert_eq!(saved.identity.assigned_ip.as_deref(), Some("10.100.0.1"));

        agent.stop().await.unwrap();
        assert!(plane.is_destroyed().await);
    }

    #[tokio::test]
    async fn test_restarted_agent_keeps_address() {
        let dir = tempfile::tempdir().unwrap();
        let coordinator = TestCoordinator::start(&dir.path().join("peers.json")).await;

        let (agent, _) = test_agent(&coordinator, &dir, "a").await;
        agent.start().await.unwrap();
        agent.stop().await.unwrap();

        // Same config file, fresh process.
        let config = AgentConfig::load(&dir.path().join("a.toml")).await.unwrap();
        let plane = Arc::new(MemoryDataPlane::new());
        let agent = Agent::new(config, dir.path().join("a.toml"), plane.clone())
            .await
            .unwrap();
        agent.start().await.unwrap();

        assert_eq!(plane.address().await, Some("10.100.0.1".parse().unwrap()));
        agent.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_mesh_of_three_converges() {
        let dir = tempfile::tempdir().unwrap();
        let coordinator = TestCoordinator::start(&dir.path().join("peers.json")).await;

        let mut agents = Vec::new();
        for name in ["a", "b", "c"] {
            let (agent, plane) = test_agent(&coordinator, &dir, name).await;
            agent.start().await.unwrap();
            agents.push((agent, plane));
        }

        // The sync tick runs every second; after a couple of them every
        // agent has tunnels to the other two.
        tokio::time::sleep(Duration::from_millis(2500)).await;
        for (_, plane) in &agents {
            assert_eq!(plane.peers().await.len(), 2);
        }

        for (agent, _) in &agents {
            agent.stop().await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_start_fails_without_coordinator() {
        let dir = tempfile::tempdir().unwrap();

        let mut config = AgentConfig::default();
        // Nothing listens here.
        config.server.addr = "http://127.0.0.1:9".into();
        config.timing.http_timeout_secs = 1;

        let plane = Arc::new(MemoryDataPlane::new());
        let agent = Agent::new(config, dir.path().join("a.toml"), plane.clone())
            .await
            .unwrap();

        assert!(agent.start().await.is_err());
        // The interface was never created.
        assert!(plane.address().await.is_none());
    }
}
