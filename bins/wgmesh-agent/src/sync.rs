//! Peer reconciliation
//!
//! Applies the coordinator's peer snapshot to the local data plane. Each
//! cycle is a full snapshot apply: every online peer is upserted, and
//! keys this reconciler configured earlier that the coordinator no longer
//! lists are removed. The configured-key cache only records successful
//! upserts, so a peer that failed to apply is retried on the next cycle.

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use wgmesh_net::{DataPlane, PeerConfig};
use wgmesh_proto::{Peer, PERSISTENT_KEEPALIVE_SECS};

use crate::api::CoordinatorClient;

/// Drives the data plane toward the coordinator's view.
pub struct Reconciler {
    dataplane: Arc<dyn DataPlane>,
    configured: Mutex<HashSet<String>>,
}

impl Reconciler {
    pub fn new(dataplane: Arc<dyn DataPlane>) -> Self {
        Self {
            dataplane,
            configured: Mutex::new(HashSet::new()),
        }
    }

    /// Apply one peer snapshot. Returns how many peers were upserted.
    ///
    /// Concurrent callers serialize on the cache lock, so two overlapping
    /// cycles with the same snapshot land in the same terminal state.
    pub async fn apply(&self, peers: &[Peer]) -> usize {
        let mut configured = self.configured.lock().await;

        let mut desired = HashSet::new();
        let mut applied = 0;
        for peer in peers.iter().filter(|p| p.online) {
            desired.insert(peer.public_key.clone());

            match self.dataplane.add_peer(desired_config(peer)).await {
                Ok(()) => {
                    configured.insert(peer.public_key.clone());
                    applied += 1;
                    debug!(peer_id = %peer.id, ip = %peer.virtual_ip, "synced peer");
                }
                Err(e) => {
                    warn!(peer_id = %peer.id, error = %e, "failed to configure peer");
                }
            }
        }

        // Peers we once configured that are gone from the snapshot.
        let stale: Vec<String> = configured.difference(&desired).cloned().collect();
        for public_key in stale {
            match self.dataplane.remove_peer(&public_key).await {
                Ok(()) => {
                    configured.remove(&public_key);
                    debug!(public_key = %public_key, "removed departed peer");
                }
                Err(e) => {
                    warn!(public_key = %public_key, error = %e, "failed to remove peer");
                }
            }
        }

        applied
    }
}

/// The data plane configuration a peer record calls for.
fn desired_config(peer: &Peer) -> PeerConfig {
    PeerConfig {
        public_key: peer.public_key.clone(),
        endpoint: peer.endpoint.parse().ok(),
        allowed_ips: peer.allowed_ips.clone(),
        persistent_keepalive: Some(PERSISTENT_KEEPALIVE_SECS),
    }
}

/// Fetch the current peer list and apply it.
pub async fn sync_once(
    client: &CoordinatorClient,
    peer_id: &str,
    reconciler: &Reconciler,
) -> Result<()> {
    let peers = client.peers(peer_id).await?;
    let applied = reconciler.apply(&peers).await;
    debug!(fetched = peers.len(), applied, "peer sync complete");
    Ok(())
}
