//! Agent configuration
//!
//! Besides operator-set values, this file persists the node's key pair
//! and the identity the coordinator handed back, so restarts re-register
//! under the same public key and land on the same virtual IP.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use wgmesh_crypto::{KeyPair, SecretKey};

/// Main agent configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Coordinator connection
    pub server: ServerConfig,
    /// Local WireGuard interface
    pub interface: InterfaceConfig,
    /// Keys and coordinator-assigned identity
    pub identity: IdentityConfig,
    /// Periodic task timing
    pub timing: TimingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Coordinator base URL, e.g. "http://coordinator.example.com:8080"
    pub addr: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterfaceConfig {
    /// Interface name
    pub name: String,
    /// WireGuard UDP listen port
    pub listen_port: u16,
    /// Advertise this node as an exit for all traffic
    pub exit_node: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdentityConfig {
    pub private_key: Option<String>,
    pub public_key: Option<String>,
    /// Assigned by the coordinator on first registration
    pub peer_id: Option<String>,
    pub assigned_ip: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    pub heartbeat_interval_secs: u64,
    pub sync_interval_secs: u64,
    pub http_timeout_secs: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                addr: "http://127.0.0.1:8080".to_string(),
            },
            interface: InterfaceConfig {
                name: "wgmesh0".to_string(),
                listen_port: wgmesh_proto::DEFAULT_WIREGUARD_PORT,
                exit_node: false,
            },
            identity: IdentityConfig::default(),
            timing: TimingConfig {
                heartbeat_interval_secs: wgmesh_proto::HEARTBEAT_INTERVAL_SECS,
                sync_interval_secs: wgmesh_proto::PEER_SYNC_INTERVAL_SECS,
                http_timeout_secs: wgmesh_proto::HTTP_TIMEOUT_SECS,
            },
        }
    }
}

impl AgentConfig {
    /// Load configuration from file
    pub async fn load(path: &Path) -> Result<Self> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .context("Failed to read config file")?;
        toml::from_str(&contents).context("Failed to parse config file")
    }

    /// Load or create default configuration
    pub async fn load_or_create(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path).await
        } else {
            let config = Self::default();
            config.save(path).await?;
            Ok(config)
        }
    }

    /// Save configuration to file
    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let contents = toml::to_string_pretty(self)?;
        tokio::fs::write(path, contents).await?;
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.server.addr.is_empty() {
            anyhow::bail!("server.addr must be set");
        }
        if self.interface.name.is_empty() {
            anyhow::bail!("interface.name must be set");
        }
        if self.interface.listen_port == 0 {
            anyhow::bail!("interface.listen_port must be non-zero");
        }
        if self.timing.heartbeat_interval_secs == 0
            || self.timing.sync_interval_secs == 0
            || self.timing.http_timeout_secs == 0
        {
            anyhow::bail!("timing values must be non-zero");
        }
        Ok(())
    }

    /// Generate a key pair if none is stored yet. Returns true when the
    /// config changed and should be saved.
    pub fn ensure_identity(&mut self) -> Result<bool> {
        match &self.identity.private_key {
            Some(private_key) => {
                let secret = SecretKey::from_base64(private_key)
                    .context("identity.private_key is not a valid key")?;
                let public = secret.public_key().to_base64();
                if self.identity.public_key.as_deref() != Some(public.as_str()) {
                    self.identity.public_key = Some(public);
                    return Ok(true);
                }
                Ok(false)
            }
            None => {
                let pair = KeyPair::generate();
                self.identity.private_key = Some(pair.secret.to_base64());
                self.identity.public_key = Some(pair.public.to_base64());
                Ok(true)
            }
        }
    }
}
