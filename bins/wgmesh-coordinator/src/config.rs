//! Coordinator configuration

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use wgmesh_crypto::{KeyPair, SecretKey};

/// Main coordinator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// HTTP API configuration
    pub http: HttpConfig,
    /// Overlay network configuration
    pub network: NetworkConfig,
    /// Peer snapshot configuration
    pub store: StoreConfig,
    /// Server key pair, generated on first start
    pub identity: IdentityConfig,
    /// Liveness timing
    pub timing: TimingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Listen address for the agent API
    pub listen_addr: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Overlay CIDR agents are assigned from
    pub cidr: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Snapshot path; relative paths resolve next to the config file
    pub path: PathBuf,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdentityConfig {
    pub private_key: Option<String>,
    pub public_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Heartbeat silence before a peer is marked offline (seconds)
    pub heartbeat_timeout_secs: u64,
    /// Sweep period (seconds)
    pub sweep_interval_secs: u64,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            http: HttpConfig {
                listen_addr: "0.0.0.0:8080".to_string(),
            },
            network: NetworkConfig {
                cidr: wgmesh_proto::DEFAULT_NETWORK_CIDR.to_string(),
            },
            store: StoreConfig {
                path: PathBuf::from("peers.json"),
            },
            identity: IdentityConfig::default(),
            timing: TimingConfig {
                heartbeat_timeout_secs: wgmesh_proto::HEARTBEAT_TIMEOUT_SECS,
                sweep_interval_secs: wgmesh_proto::SWEEP_INTERVAL_SECS,
            },
        }
    }
}

impl CoordinatorConfig {
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
        self.http
            .listen_addr
            .parse::<std::net::SocketAddr>()
            .context("http.listen_addr must be ip:port")?;

        if self.timing.heartbeat_timeout_secs == 0 || self.timing.sweep_interval_secs == 0 {
            anyhow::bail!("timing values must be non-zero");
        }

        Ok(())
    }

    /// Generate the server key pair if none is stored yet. Returns true
    /// when the config changed and should be saved.
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

    /// Snapshot path, resolved against the config file's directory.
    pub fn store_path(&self, config_path: &Path) -> PathBuf {
        if self.store.path.is_absolute() {
            self.store.path.clone()
        } else {
            config_path
                .parent()
                .unwrap_or_else(|| Path::new("."))
                .join(&self.store.path)
        }
    }
}
