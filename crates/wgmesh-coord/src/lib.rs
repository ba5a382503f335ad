//! wgmesh coordinator
//!
//! Owns the authoritative peer registry for the overlay network:
//! - idempotent registration with stable virtual IP assignment
//! - address allocation inside the configured CIDR
//! - liveness tracking driven by agent heartbeats and a background sweeper
//! - a durable JSON snapshot of the peer table
//! - the HTTP API agents talk to

pub mod error;
pub mod http;
pub mod ipam;
pub mod registry;
pub mod store;
pub mod sweeper;

pub use error::{CoordError, CoordResult};
pub use http::{router, ApiState};
pub use ipam::IpAllocator;
pub use registry::{Registered, Registry};
pub use store::PeerStore;
