//! Background liveness sweeper
//!
//! Wakes on a fixed period and demotes peers whose heartbeats have
//! lapsed. The task holds a shutdown receiver so coordinator shutdown can
//! join it instead of abandoning it mid-sweep.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::registry::Registry;

/// Spawn the sweeper task.
pub fn spawn(
    registry: Arc<Registry>,
    interval: Duration,
    timeout: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // interval's first tick fires immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        debug!("sweeper shutting down");
                        return;
                    }
                }
                _ = ticker.tick() => {
                    let flipped = registry.sweep_stale(timeout).await;
                    if flipped > 0 {
                        info!(flipped, "sweep demoted stale peers");
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use wgmesh_crypto::KeyPair;
    use wgmesh_proto::RegisterRequest;

    use crate::store::PeerStore;

    #[tokio::test]
    async fn test_sweeper_demotes_and_stops() {
        let dir = tempfile::tempdir().unwrap();
        let store = PeerStore::new(dir.path().join("peers.json")).await.unwrap();
        let registry = Arc::new(Registry::new("10.100.0.0/16", store).unwrap());

        let request = |key: String| RegisterRequest {
            public_key: key,
            hostname: "node".into(),
            os: "linux".into(),
            endpoint: String::new(),
            request_ip: true,
            exit_node: false,
            allowed_ips: Vec::new(),
        };
        let a = registry
            .register(&request(KeyPair::generate().public.to_base64()))
            .await
            .unwrap();
        let b = registry
            .register(&request(KeyPair::generate().public.to_base64()))
            .await
            .unwrap();

        let seen = registry.list_peers_except(&b.peer_id).await.unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].id, a.peer_id);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = spawn(
            registry.clone(),
            Duration::from_millis(20),
            Duration::from_millis(5),
            shutdown_rx,
        );

        // Give the sweeper a few periods to notice the silence.
        tokio::time::sleep(Duration::from_millis(120)).await;
        let seen = registry.list_peers_except(&b.peer_id).await.unwrap();
        assert!(seen.is_empty());

        shutdown_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("sweeper exits on shutdown")
            .unwrap();
    }
}
