//! In-process coordinator for agent tests

use std::path::Path;
use std::sync::Arc;

use wgmesh_coord::{router, ApiState, PeerStore, Registry};
use wgmesh_crypto::KeyPair;

pub struct TestCoordinator {
    pub base: String,
    pub registry: Arc<Registry>,
}

impl TestCoordinator {
    pub async fn start(store_path: &Path) -> Self {
        Self::start_with_cidr(store_path, "10.100.0.0/16").await
    }

    pub async fn start_with_cidr(store_path: &Path, cidr: &str) -> Self {
        let store = PeerStore::new(store_path).await.unwrap();
        let registry = Arc::new(Registry::new(cidr, store).unwrap());

        let app = router(ApiState {
            registry: registry.clone(),
            server_public_key: KeyPair::generate().public.to_base64(),
        });

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let _ = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base: format!("http://{addr}"),
            registry,
        }
    }
}
