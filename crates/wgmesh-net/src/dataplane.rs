//! Platform-agnostic WireGuard interface trait

use std::net::{Ipv4Addr, SocketAddr};

use async_trait::async_trait;

use crate::error::NetResult;

/// Desired configuration for a single tunnel peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerConfig {
    /// Base64 Curve25519 public key
    pub public_key: String,
    /// Remote UDP endpoint; `None` leaves the tunnel passive-only
    pub endpoint: Option<SocketAddr>,
    /// CIDRs routed into this tunnel
    pub allowed_ips: Vec<String>,
    /// Keepalive period in seconds
    pub persistent_keepalive: Option<u16>,
}

/// Per-peer view reported by [`DataPlane::stats`].
#[derive(Debug, Clone)]
pub struct PeerStats {
    pub public_key: String,
    pub endpoint: Option<SocketAddr>,
    pub allowed_ips: Vec<String>,
    pub persistent_keepalive: Option<u16>,
}

/// Interface-wide view reported by [`DataPlane::stats`].
#[derive(Debug, Clone)]
pub struct InterfaceStats {
    pub name: String,
    pub public_key: String,
    pub listen_port: u16,
    pub peers: Vec<PeerStats>,
}

/// The control plane's only point of contact with OS networking.
///
/// Call order is `create`, `configure`, then any number of `add_peer` /
/// `remove_peer` cycles, then `destroy`. `add_peer` with a key that is
/// already present replaces that peer's endpoint, allowed IPs and
/// keepalive. Implementations are not required to be thread safe; callers
/// that share a handle must serialize access themselves.
#[async_trait]
pub trait DataPlane: Send + Sync {
    /// Bring up an interface holding `address/32`
    async fn create(&self, name: &str, address: Ipv4Addr) -> NetResult<()>;

    /// Set the node's own private key and UDP listen port
    async fn configure(&self, private_key: &str, listen_port: u16) -> NetResult<()>;

    /// Idempotent upsert of a tunnel peer
    async fn add_peer(&self, peer: PeerConfig) -> NetResult<()>;

    /// Drop a tunnel peer by public key
    async fn remove_peer(&self, public_key: &str) -> NetResult<()>;

    /// Current interface state
    async fn stats(&self) -> NetResult<InterfaceStats>;

    /// Tear the interface down
    async fn destroy(&self) -> NetResult<()>;
}
