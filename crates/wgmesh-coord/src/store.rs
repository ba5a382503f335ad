//! Durable peer snapshot
//!
//! One JSON array of peer records, rewritten atomically (write to a
//! sibling temp file, then rename) on every save. Concurrent callers are
//! serialized by an internal mutex; the registry additionally calls in
//! under its own write lock.

use std::path::{Path, PathBuf};

use tokio::sync::Mutex;

use wgmesh_proto::Peer;

use crate::error::CoordResult;

/// File-backed peer snapshot.
#[derive(Debug)]
pub struct PeerStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl PeerStore {
    /// Open a store at `path`, creating parent directories.
    pub async fn new(path: impl AsRef<Path>) -> CoordResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        Ok(Self {
            path,
            lock: Mutex::new(()),
        })
    }

    /// Insert or update one peer and persist the whole snapshot.
    pub async fn save(&self, peer: &Peer) -> CoordResult<()> {
        let _guard = self.lock.lock().await;

        let mut peers = self.load_unlocked().await?;
        match peers.iter_mut().find(|p| p.id == peer.id) {
            Some(existing) => *existing = peer.clone(),
            None => peers.push(peer.clone()),
        }
        self.write_unlocked(&peers).await
    }

    /// Every persisted peer; empty when no snapshot exists yet.
    pub async fn load_all(&self) -> CoordResult<Vec<Peer>> {
        let _guard = self.lock.lock().await;
        self.load_unlocked().await
    }

    /// Remove one peer from the snapshot.
    pub async fn delete(&self, peer_id: &str) -> CoordResult<()> {
        let _guard = self.lock.lock().await;

        let mut peers = self.load_unlocked().await?;
        peers.retain(|p| p.id != peer_id);
        self.write_unlocked(&peers).await
    }

    async fn load_unlocked(&self) -> CoordResult<Vec<Peer>> {
        let data = match tokio::fs::read(&self.path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_slice(&data)?)
    }

    async fn write_unlocked(&self, peers: &[Peer]) -> CoordResult<()> {
        let data = serde_json::to_vec_pretty(peers)?;
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, &data).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn peer(id: &str, ip: &str) -> Peer {
        Peer {
            id: id.to_string(),
            public_key: format!("key-{id}"),
            virtual_ip: ip.to_string(),
            endpoint: String::new(),
            hostname: "host".into(),
            os: "linux".into(),
            allowed_ips: vec![format!("{ip}/32")],
            exit_node: false,
            last_heartbeat: Utc::now(),
            online: true,
        }
    }

    #[tokio::test]
    async fn test_missing_snapshot_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = PeerStore::new(dir.path().join("peers.json")).await.unwrap();
        assert!(store.load_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("peers.json");

        let store = PeerStore::new(&path).await.unwrap();
        store.save(&peer("peer-1", "10.100.0.1")).await.unwrap();
        store.save(&peer("peer-2", "10.100.0.2")).await.unwrap();

        // A fresh store over the same file observes both peers.
        let reopened = PeerStore::new(&path).await.unwrap();
        let peers = reopened.load_all().await.unwrap();
        assert_eq!(peers.len(), 2);
    }

    #[tokio::test]
    async fn test_save_updates_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let store = PeerStore::new(dir.path().join("peers.json")).await.unwrap();

        store.save(&peer("peer-1", "10.100.0.1")).await.unwrap();
        let mut updated = peer("peer-1", "10.100.0.1");
        updated.endpoint = "1.2.3.4:51820".into();
        updated.online = false;
        store.save(&updated).await.unwrap();

        let peers = store.load_all().await.unwrap();
        assert_eq!(peers.len(), 1);
        assert_eq!(peers[0].endpoint, "1.2.3.4:51820");
        assert!(!peers[0].online);
    }

    #[tokio::test]
    async fn test_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = PeerStore::new(dir.path().join("peers.json")).await.unwrap();

        store.save(&peer("peer-1", "10.100.0.1")).await.unwrap();
        store.save(&peer("peer-2", "10.100.0.2")).await.unwrap();
        store.delete("peer-1").await.unwrap();

        let peers = store.load_all().await.unwrap();
        assert_eq!(peers.len(), 1);
        assert_eq!(peers[0].id, "peer-2");
    }

    #[tokio::test]
    async fn test_no_temp_file_left_behind() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("peers.json");
        let store = PeerStore::new(&path).await.unwrap();

        store.save(&peer("peer-1", "10.100.0.1")).await.unwrap();
        assert!(path.exists());
        assert!(!path.with_extension("tmp").exists());
    }

    #[tokio::test]
    async fn test_concurrent_saves() {
        let dir = tempfile::tempdir().unwrap();
        let store = std::sync::Arc::new(
            PeerStore::new(dir.path().join("peers.json")).await.unwrap(),
        );

        let mut handles = Vec::new();
        for i in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .save(&peer(&format!("peer-{i}"), &format!("10.100.0.{}", i + 1)))
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(store.load_all().await.unwrap().len(), 8);
    }
}
