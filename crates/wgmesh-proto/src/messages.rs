//! Request/response messages for the coordinator HTTP API
//!
//! Application-level outcomes ride in the body as `{success, error}`;
//! HTTP status codes are reserved for protocol and method errors.

use serde::{Deserialize, Serialize};

use crate::peer::Peer;

/// Sent by an agent to register with the coordinator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    /// Curve25519 public key, base64
    pub public_key: String,
    pub hostname: String,
    pub os: String,
    /// Best-effort external "ip:port", empty when unknown
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub endpoint: String,
    #[serde(default)]
    pub request_ip: bool,
    #[serde(default)]
    pub exit_node: bool,
    /// CIDRs the agent claims to terminate; the coordinator derives the
    /// authoritative set itself and only consults the exit flag
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed_ips: Vec<String>,
}

/// Registration outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub assigned_ip: String,
    #[serde(default)]
    pub network_cidr: String,
    #[serde(default)]
    pub peer_id: String,
    #[serde(default)]
    pub server_public_key: String,
}

impl RegisterResponse {
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            assigned_ip: String::new(),
            network_cidr: String::new(),
            peer_id: String::new(),
            server_public_key: String::new(),
        }
    }
}

/// Periodic liveness ping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatRequest {
    pub peer_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub endpoint: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HeartbeatResponse {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }
}

/// Every peer except the caller, online only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerListResponse {
    pub peers: Vec<Peer>,
}
