//! Coordinator errors
//!
//! These surface to agents as in-band `{success: false, error}` payloads,
//! so the display strings are part of the operator-visible behavior.

use std::net::Ipv4Addr;

use thiserror::Error;

/// Coordinator errors
#[derive(Debug, Error)]
pub enum CoordError {
    /// Malformed or incomplete request
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Peer id not present in the registry
    #[error("Peer not found: {0}")]
    UnknownPeer(String),

    /// The address pool has no free addresses left
    #[error("No more addresses available in network {0}")]
    AddressExhausted(String),

    /// Address already held by another peer
    #[error("Address already allocated: {0}")]
    Conflict(Ipv4Addr),

    /// Address outside the usable host range of the network
    #[error("Address {0} not usable in network {1}")]
    OutOfRange(Ipv4Addr, String),

    /// Unparseable network CIDR
    #[error("Invalid CIDR: {0}")]
    InvalidCidr(String),

    /// Persisted snapshot violates a registry invariant
    #[error("Corrupt peer snapshot: {0}")]
    CorruptSnapshot(String),

    /// Store IO failure
    #[error("Store IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Store encoding failure
    #[error("Store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for coordinator operations
pub type CoordResult<T> = Result<T, CoordError>;
