//! The authoritative peer record

use std::net::Ipv4Addr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A registered participant in the overlay network.
///
/// The coordinator owns these records; agents only ever see them through the
/// peer list endpoint. Field names are the wire format and the on-disk
/// snapshot format, so they must stay stable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Peer {
    /// Coordinator-minted identifier, stable across re-registration
    pub id: String,
    /// Curve25519 public key, base64
    pub public_key: String,
    /// Address assigned inside the overlay CIDR
    pub virtual_ip: String,
    /// Last known reachable "ip:port", may be absent
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub endpoint: String,
    pub hostname: String,
    pub os: String,
    /// CIDRs this peer terminates; `[0]` is always `<virtual_ip>/32`
    pub allowed_ips: Vec<String>,
    pub exit_node: bool,
    pub last_heartbeat: DateTime<Utc>,
    pub online: bool,
}

impl Peer {
    /// Build the allowed-IPs set for an address and exit flag.
    pub fn allowed_ips_for(virtual_ip: Ipv4Addr, exit_node: bool) -> Vec<String> {
        let mut allowed = vec![format!("{virtual_ip}/32")];
        if exit_node {
            allowed.push("0.0.0.0/0".to_string());
        }
        allowed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allowed_ips_plain_peer() {
        let allowed = Peer::allowed_ips_for(Ipv4Addr::new(10, 100, 0, 1), false);
        assert_eq!(allowed, vec!["10.100.0.1/32"]);
    }

    #[test]
    fn test_allowed_ips_exit_node() {
        let allowed = Peer::allowed_ips_for(Ipv4Addr::new(10, 100, 0, 1), true);
        assert_eq!(allowed, vec!["10.100.0.1/32", "0.0.0.0/0"]);
    }

    #[test]
    fn test_peer_wire_field_names() {
        let peer = Peer {
            id: "peer-1".into(),
            public_key: "AAAA".into(),
            virtual_ip: "10.100.0.1".into(),
            endpoint: "1.2.3.4:51820".into(),
            hostname: "node-a".into(),
            os: "linux".into(),
            allowed_ips: vec!["10.100.0.1/32".into()],
            exit_node: false,
            last_heartbeat: Utc::now(),
            online: true,
        };

        let json = serde_json::to_value(&peer).unwrap();
        for key in [
            "id",
            "public_key",
            "virtual_ip",
            "endpoint",
            "hostname",
            "os",
            "allowed_ips",
            "exit_node",
            "last_heartbeat",
            "online",
        ] {
            assert!(json.get(key).is_some(), "missing wire field {key}");
        }
    }

    #[test]
    fn test_empty_endpoint_omitted() {
        let peer = Peer {
            id: "peer-1".into(),
            public_key: "AAAA".into(),
            virtual_ip: "10.100.0.1".into(),
            endpoint: String::new(),
            hostname: "node-a".into(),
            os: "linux".into(),
            allowed_ips: vec!["10.100.0.1/32".into()],
            exit_node: false,
            last_heartbeat: Utc::now(),
            online: true,
        };

        let json = serde_json::to_value(&peer).unwrap();
        assert!(json.get("endpoint").is_none());

        let back: Peer = serde_json::from_value(json).unwrap();
        assert!(back.endpoint.is_empty());
    }
}
