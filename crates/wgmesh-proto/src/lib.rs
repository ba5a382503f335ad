//! Wire protocol for the wgmesh control plane
//!
//! Defines the request/response messages exchanged between agents and the
//! coordinator, and the authoritative `Peer` record both sides share.

pub mod messages;
pub mod peer;

pub use messages::{
    HeartbeatRequest, HeartbeatResponse, PeerListResponse, RegisterRequest, RegisterResponse,
};
pub use peer::Peer;

/// Overlay network assigned when no CIDR is configured
pub const DEFAULT_NETWORK_CIDR: &str = "10.100.0.0/16";

/// WireGuard UDP listen port
pub const DEFAULT_WIREGUARD_PORT: u16 = 51820;

/// Agent heartbeat period (seconds)
pub const HEARTBEAT_INTERVAL_SECS: u64 = 30;

/// Agent peer list sync period (seconds)
pub const PEER_SYNC_INTERVAL_SECS: u64 = 60;

/// Coordinator marks a peer offline after this heartbeat silence (seconds)
pub const HEARTBEAT_TIMEOUT_SECS: u64 = 120;

/// Coordinator liveness sweep period (seconds)
pub const SWEEP_INTERVAL_SECS: u64 = 60;

/// Agent HTTP request deadline (seconds)
pub const HTTP_TIMEOUT_SECS: u64 = 10;

/// Persistent keepalive applied to every tunnel peer (seconds)
pub const PERSISTENT_KEEPALIVE_SECS: u16 = 25;
