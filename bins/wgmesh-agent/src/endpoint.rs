//! Best-effort endpoint detection
//!
//! Finds the local address the OS would use to reach the coordinator and
//! pairs it with the WireGuard listen port. Connecting a UDP socket sends
//! no packets; it only asks the routing table. Nodes behind NAT will
//! publish a private address, which is fine: endpoints are a hint, peers
//! without a usable one stay passive-only.

use tokio::net::UdpSocket;

/// Detect "ip:port" as seen from the local routing table, or None.
pub async fn detect(server_addr: &str, listen_port: u16) -> Option<String> {
    let url = reqwest::Url::parse(server_addr).ok()?;
    let host = url.host_str()?.to_string();
    let port = url.port_or_known_default().unwrap_or(80);

    let socket = UdpSocket::bind("0.0.0.0:0").await.ok()?;
    socket.connect((host.as_str(), port)).await.ok()?;
    let local = socket.local_addr().ok()?;

    if local.ip().is_unspecified() {
        return None;
    }
    Some(format!("{}:{}", local.ip(), listen_port))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unparseable_server_addr() {
        assert!(detect("not a url", 51820).await.is_none());
    }

    #[tokio::test]
    async fn test_detected_endpoint_uses_listen_port() {
        // Loopback coordinator still yields a routable-form endpoint.
        if let Some(endpoint) = detect("http://127.0.0.1:9", 51820).await {
            assert!(endpoint.ends_with(":51820"));
            assert!(endpoint.parse::<std::net::SocketAddr>().is_ok());
        }
    }
}
