//! HTTP client for the coordinator API
//!
//! Every call carries the configured deadline; a timeout or transport
//! failure surfaces as an error for the current tick only, the periodic
//! tasks simply try again on the next one.

use std::time::Duration;

use anyhow::{bail, Context, Result};

use wgmesh_proto::{
    HeartbeatRequest, HeartbeatResponse, Peer, PeerListResponse, RegisterRequest, RegisterResponse,
};

/// Client for one coordinator.
#[derive(Clone)]
pub struct CoordinatorClient {
    base: String,
    http: reqwest::Client,
}

impl CoordinatorClient {
    pub fn new(server_addr: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            base: server_addr.trim_end_matches('/').to_string(),
            http,
        })
    }

    /// Coordinator base URL.
    pub fn server_addr(&self) -> &str {
        &self.base
    }

    /// Register this node. A repeat call with the same public key returns
    /// the same peer id and virtual IP.
    pub async fn register(&self, req: &RegisterRequest) -> Result<RegisterResponse> {
        let resp = self
            .http
            .post(format!("{}/register", self.base))
            .json(req)
            .send()
            .await
            .context("failed to reach coordinator")?;
        if !resp.status().is_success() {
            bail!("coordinator returned status {}", resp.status());
        }

        let body: RegisterResponse = resp
            .json()
            .await
            .context("failed to decode registration response")?;
        if !body.success {
            bail!(
                "registration rejected: {}",
                body.error.unwrap_or_else(|| "unknown error".into())
            );
        }
        Ok(body)
    }

    /// Refresh liveness, optionally publishing a new endpoint.
    pub async fn heartbeat(&self, peer_id: &str, endpoint: Option<String>) -> Result<()> {
        let req = HeartbeatRequest {
            peer_id: peer_id.to_string(),
            endpoint: endpoint.unwrap_or_default(),
        };

        let resp = self
            .http
            .post(format!("{}/heartbeat", self.base))
            .json(&req)
            .send()
            .await
            .context("failed to reach coordinator")?;
        if !resp.status().is_success() {
            bail!("coordinator returned status {}", resp.status());
        }

        let body: HeartbeatResponse = resp
            .json()
            .await
            .context("failed to decode heartbeat response")?;
        if !body.success {
            bail!(
                "heartbeat rejected: {}",
                body.error.unwrap_or_else(|| "unknown error".into())
            );
        }
        Ok(())
    }

    /// Fetch every other online peer.
    pub async fn peers(&self, peer_id: &str) -> Result<Vec<Peer>> {
        let resp = self
            .http
            .get(format!("{}/peers?peer_id={peer_id}", self.base))
            .send()
            .await
            .context("failed to reach coordinator")?;
        if !resp.status().is_success() {
            bail!("coordinator returned status {}", resp.status());
        }

        let body: PeerListResponse = resp
            .json()
            .await
            .context("failed to decode peer list")?;
        Ok(body.peers)
    }
}
