//! In-memory data plane
//!
//! Records every mutation without touching the OS. The control plane is
//! tested against this implementation; it enforces the same call-order
//! contract as the real ones.

use std::collections::BTreeMap;
use std::net::Ipv4Addr;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::dataplane::{DataPlane, InterfaceStats, PeerConfig, PeerStats};
use crate::error::{NetError, NetResult};

#[derive(Debug, Default)]
struct MemoryState {
    name: Option<String>,
    address: Option<Ipv4Addr>,
    private_key: Option<String>,
    listen_port: u16,
    peers: BTreeMap<String, PeerConfig>,
    destroyed: bool,
}

/// Fake data plane backed by a map.
#[derive(Debug, Default)]
pub struct MemoryDataPlane {
    state: Mutex<MemoryState>,
}

impl MemoryDataPlane {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configured peers, ordered by public key.
    pub async fn peers(&self) -> Vec<PeerConfig> {
        self.state.lock().await.peers.values().cloned().collect()
    }

    /// Look up one peer by public key.
    pub async fn peer(&self, public_key: &str) -> Option<PeerConfig> {
        self.state.lock().await.peers.get(public_key).cloned()
    }

    /// Interface address, if created.
    pub async fn address(&self) -> Option<Ipv4Addr> {
        self.state.lock().await.address
    }

    /// Whether destroy() has been called.
    pub async fn is_destroyed(&self) -> bool {
        self.state.lock().await.destroyed
    }
}

#[async_trait]
impl DataPlane for MemoryDataPlane {
    async fn create(&self, name: &str, address: Ipv4Addr) -> NetResult<()> {
        let mut state = self.state.lock().await;
        if let Some(existing) = &state.name {
            if !state.destroyed {
                return Err(NetError::AlreadyCreated(existing.clone()));
            }
        }
        state.name = Some(name.to_string());
        state.address = Some(address);
        state.destroyed = false;
        Ok(())
    }

    async fn configure(&self, private_key: &str, listen_port: u16) -> NetResult<()> {
        let mut state = self.state.lock().await;
        if state.name.is_none() || state.destroyed {
            return Err(NetError::NotCreated);
        }
        state.private_key = Some(private_key.to_string());
        state.listen_port = listen_port;
        Ok(())
    }

    async fn add_peer(&self, peer: PeerConfig) -> NetResult<()> {
        let mut state = self.state.lock().await;
        if state.name.is_none() || state.destroyed {
            return Err(NetError::NotCreated);
        }
        if peer.public_key.is_empty() {
            return Err(NetError::InvalidPeer("empty public key".into()));
        }
        state.peers.insert(peer.public_key.clone(), peer);
        Ok(())
    }

    async fn remove_peer(&self, public_key: &str) -> NetResult<()> {
        let mut state = self.state.lock().await;
        if state.name.is_none() || state.destroyed {
            return Err(NetError::NotCreated);
        }
        state.peers.remove(public_key);
        Ok(())
    }

    async fn stats(&self) -> NetResult<InterfaceStats> {
        let state = self.state.lock().await;
        let name = state.name.clone().ok_or(NetError::NotCreated)?;
        Ok(InterfaceStats {
            name,
            public_key: String::new(),
            listen_port: state.listen_port,
            peers: state
                .peers
                .values()
                .map(|p| PeerStats {
                    public_key: p.public_key.clone(),
                    endpoint: p.endpoint,
                    allowed_ips: p.allowed_ips.clone(),
                    persistent_keepalive: p.persistent_keepalive,
                })
                .collect(),
        })
    }

    async fn destroy(&self) -> NetResult<()> {
        let mut state = self.state.lock().await;
        if state.name.is_none() {
            return Err(NetError::NotCreated);
        }
        state.peers.clear();
        state.destroyed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer(key: &str, allowed: &[&str]) -> PeerConfig {
        PeerConfig {
            public_key: key.to_string(),
            endpoint: None,
            allowed_ips: allowed.iter().map(|s| s.to_string()).collect(),
            persistent_keepalive: Some(25),
        }
    }

    #[tokio::test]
    async fn test_lifecycle() {
        let plane = MemoryDataPlane::new();
        plane
            .create("wgmesh0", Ipv4Addr::new(10, 100, 0, 1))
            .await
            .unwrap();
        plane.configure("priv", 51820).await.unwrap();

        plane.add_peer(peer("k1", &["10.100.0.2/32"])).await.unwrap();
        let stats = plane.stats().await.unwrap();
        assert_eq!(stats.name, "wgmesh0");
        assert_eq!(stats.listen_port, 51820);
        assert_eq!(stats.peers.len(), 1);

        plane.destroy().await.unwrap();
        assert!(plane.is_destroyed().await);
    }

    #[tokio::test]
    async fn test_add_peer_is_upsert() {
        let plane = MemoryDataPlane::new();
        plane
            .create("wgmesh0", Ipv4Addr::new(10, 100, 0, 1))
            .await
            .unwrap();

        plane.add_peer(peer("k1", &["10.100.0.2/32"])).await.unwrap();
        let mut updated = peer("k1", &["10.100.0.2/32", "0.0.0.0/0"]);
        updated.endpoint = Some("1.2.3.4:51820".parse().unwrap());
        plane.add_peer(updated.clone()).await.unwrap();

        let peers = plane.peers().await;
        assert_eq!(peers.len(), 1);
        assert_eq!(peers[0], updated);
    }

    #[tokio::test]
    async fn test_operations_require_create() {
        let plane = MemoryDataPlane::new();
        assert!(matches!(
            plane.configure("priv", 51820).await,
            Err(NetError::NotCreated)
        ));
        assert!(matches!(
            plane.add_peer(peer("k1", &[])).await,
            Err(NetError::NotCreated)
        ));
        assert!(matches!(plane.stats().await, Err(NetError::NotCreated)));
    }

    #[tokio::test]
    async fn test_double_create_rejected() {
        let plane = MemoryDataPlane::new();
        plane
            .create("wgmesh0", Ipv4Addr::new(10, 100, 0, 1))
            .await
            .unwrap();
        assert!(matches!(
            plane.create("wgmesh0", Ipv4Addr::new(10, 100, 0, 1)).await,
            Err(NetError::AlreadyCreated(_))
        ));
    }

    #[tokio::test]
    async fn test_remove_missing_peer_is_noop() {
        let plane = MemoryDataPlane::new();
        plane
            .create("wgmesh0", Ipv4Addr::new(10, 100, 0, 1))
            .await
            .unwrap();
        plane.remove_peer("absent").await.unwrap();
    }
}
