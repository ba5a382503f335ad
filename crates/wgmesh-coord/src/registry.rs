//! The authoritative peer table
//!
//! One readers-writer lock guards the table, the key index and the
//! address allocator together, so every read observes a consistent
//! snapshot and a registering agent immediately sees itself in
//! subsequent reads. Mutations persist to the store before the lock is
//! released; a store failure is logged and does not fail the operation.

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{error, info};

use wgmesh_proto::{Peer, RegisterRequest};

use crate::error::{CoordError, CoordResult};
use crate::ipam::IpAllocator;
use crate::store::PeerStore;

/// What a successful registration hands back to the agent.
#[derive(Debug, Clone)]
pub struct Registered {
    pub peer_id: String,
    pub assigned_ip: Ipv4Addr,
    pub network_cidr: String,
}

struct Inner {
    peers: HashMap<String, Peer>,
    ids_by_key: HashMap<String, String>,
    ipam: IpAllocator,
}

/// Coordinator-side peer registry.
pub struct Registry {
    inner: RwLock<Inner>,
    store: PeerStore,
}

impl Registry {
    /// Create an empty registry over the given network.
    pub fn new(network_cidr: &str, store: PeerStore) -> CoordResult<Self> {
        let ipam = IpAllocator::new(network_cidr)?;
        Ok(Self {
            inner: RwLock::new(Inner {
                peers: HashMap::new(),
                ids_by_key: HashMap::new(),
                ipam,
            }),
            store,
        })
    }

    /// Rebuild the table from the persisted snapshot, re-reserving every
    /// assigned address. A snapshot that repeats a public key or virtual
    /// IP is refused outright rather than silently repaired.
    pub async fn restore(&self) -> CoordResult<usize> {
        let peers = self.store.load_all().await?;
        let mut inner = self.inner.write().await;

        for peer in &peers {
            if inner.ids_by_key.contains_key(&peer.public_key) {
                return Err(CoordError::CorruptSnapshot(format!(
                    "public key {} appears twice",
                    peer.public_key
                )));
            }
            let ip: Ipv4Addr = peer.virtual_ip.parse().map_err(|_| {
                CoordError::CorruptSnapshot(format!(
                    "peer {} has unparseable virtual ip {}",
                    peer.id, peer.virtual_ip
                ))
            })?;
            inner.ipam.reserve(ip).map_err(|e| {
                CoordError::CorruptSnapshot(format!("peer {}: {e}", peer.id))
            })?;

            inner
                .ids_by_key
                .insert(peer.public_key.clone(), peer.id.clone());
            inner.peers.insert(peer.id.clone(), peer.clone());
        }

        info!(count = peers.len(), "loaded peers from store");
        Ok(peers.len())
    }

    /// Register a peer, or refresh it if the public key is already known.
    ///
    /// Re-registration always returns the original id and virtual IP, so
    /// an agent may retry freely after restarts on either side.
    pub async fn register(&self, req: &RegisterRequest) -> CoordResult<Registered> {
        wgmesh_crypto::decode_key(&req.public_key)
            .map_err(|e| CoordError::InvalidRequest(format!("bad public key: {e}")))?;

        let mut inner = self.inner.write().await;
        let network_cidr = inner.ipam.cidr();

        if let Some(id) = inner.ids_by_key.get(&req.public_key).cloned() {
            let peer = inner
                .peers
                .get_mut(&id)
                .expect("key index points at a live peer");

            peer.hostname = req.hostname.clone();
            peer.os = req.os.clone();
            peer.endpoint = req.endpoint.clone();
            peer.last_heartbeat = Utc::now();
            peer.online = true;

            let assigned_ip = peer
                .virtual_ip
                .parse()
                .expect("registry only stores valid addresses");
            let snapshot = peer.clone();

            // Persist before releasing the lock so the snapshot can never
            // run behind an acknowledged mutation.
            self.persist(&snapshot).await;
            return Ok(Registered {
                peer_id: id,
                assigned_ip,
                network_cidr,
            });
        }

        let assigned_ip = inner.ipam.allocate_next()?;
        let peer_id = mint_peer_id(&inner.peers);

        let peer = Peer {
            id: peer_id.clone(),
            public_key: req.public_key.clone(),
            virtual_ip: assigned_ip.to_string(),
            endpoint: req.endpoint.clone(),
            hostname: req.hostname.clone(),
            os: req.os.clone(),
            allowed_ips: Peer::allowed_ips_for(assigned_ip, req.exit_node),
            exit_node: req.exit_node,
            last_heartbeat: Utc::now(),
            online: true,
        };

        inner.ids_by_key.insert(req.public_key.clone(), peer_id.clone());
        inner.peers.insert(peer_id.clone(), peer.clone());

        info!(peer_id = %peer_id, hostname = %peer.hostname, ip = %assigned_ip, "registered new peer");
        self.persist(&peer).await;
        drop(inner);

        Ok(Registered {
            peer_id,
            assigned_ip,
            network_cidr,
        })
    }

    /// Refresh a peer's liveness and, optionally, its endpoint.
    pub async fn heartbeat(&self, peer_id: &str, endpoint: &str) -> CoordResult<()> {
        if !endpoint.is_empty() && endpoint.parse::<std::net::SocketAddr>().is_err() {
            return Err(CoordError::InvalidRequest(format!(
                "bad endpoint: {endpoint}"
            )));
        }

        let mut inner = self.inner.write().await;
        let peer = inner
            .peers
            .get_mut(peer_id)
            .ok_or_else(|| CoordError::UnknownPeer(peer_id.to_string()))?;

        peer.last_heartbeat = Utc::now();
        peer.online = true;
        if !endpoint.is_empty() {
            peer.endpoint = endpoint.to_string();
        }

        let snapshot = peer.clone();
        self.persist(&snapshot).await;
        Ok(())
    }

    /// Every online peer except the caller.
    pub async fn list_peers_except(&self, peer_id: &str) -> CoordResult<Vec<Peer>> {
        let inner = self.inner.read().await;
        if !inner.peers.contains_key(peer_id) {
            return Err(CoordError::UnknownPeer(peer_id.to_string()));
        }

        Ok(inner
            .peers
            .values()
            .filter(|p| p.id != peer_id && p.online)
            .cloned()
            .collect())
    }

    /// Flip peers whose last heartbeat is older than `timeout` to offline.
    /// Returns how many peers changed state. Bringing a peer back online
    /// is exclusively the job of register and heartbeat.
    pub async fn sweep_stale(&self, timeout: Duration) -> usize {
        let timeout = chrono::Duration::from_std(timeout).unwrap_or(chrono::Duration::MAX);
        let now = Utc::now();

        let mut inner = self.inner.write().await;
        let mut flipped = Vec::new();
        for peer in inner.peers.values_mut() {
            if peer.online && now.signed_duration_since(peer.last_heartbeat) > timeout {
                peer.online = false;
                info!(peer_id = %peer.id, hostname = %peer.hostname, "peer went offline");
                flipped.push(peer.clone());
            }
        }

        for peer in &flipped {
            self.persist(peer).await;
        }
        drop(inner);
        flipped.len()
    }

    /// The overlay network in CIDR notation.
    pub async fn network_cidr(&self) -> String {
        self.inner.read().await.ipam.cidr()
    }

    async fn persist(&self, peer: &Peer) {
        if let Err(e) = self.store.save(peer).await {
            error!(peer_id = %peer.id, error = %e, "failed to persist peer");
        }
    }
}

/// Mint an opaque time-derived peer id, bumped until unique.
fn mint_peer_id(peers: &HashMap<String, Peer>) -> String {
    let mut nanos = Utc::now()
        .timestamp_nanos_opt()
        .unwrap_or_else(|| Utc::now().timestamp_millis());
    loop {
        let id = format!("peer-{nanos}");
        if !peers.contains_key(&id) {
            return id;
        }
        nanos += 1;
    }
}
