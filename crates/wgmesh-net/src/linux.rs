//! Linux data plane
//!
//! Drives the kernel WireGuard module with `ip` and the `wg` tool. The
//! private key is handed to `wg` through a short-lived file so it never
//! appears in an argument list.

use std::io::Write;
use std::net::Ipv4Addr;

use async_trait::async_trait;
use tokio::process::Command;
use tokio::sync::Mutex;
use tracing::debug;

use crate::dataplane::{DataPlane, InterfaceStats, PeerConfig, PeerStats};
use crate::error::{NetError, NetResult};

/// Data plane backed by the kernel module.
#[derive(Debug, Default)]
pub struct LinuxDataPlane {
    name: Mutex<Option<String>>,
}

impl LinuxDataPlane {
    pub fn new() -> Self {
        Self::default()
    }

    async fn interface_name(&self) -> NetResult<String> {
        self.name.lock().await.clone().ok_or(NetError::NotCreated)
    }
}

async fn run(program: &str, args: &[&str]) -> NetResult<String> {
    debug!(program, ?args, "running");
    let output = Command::new(program).args(args).output().await?;
    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    } else {
        Err(NetError::Command {
            command: format!("{program} {}", args.join(" ")),
            output: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}

#[async_trait]
impl DataPlane for LinuxDataPlane {
    async fn create(&self, name: &str, address: Ipv4Addr) -> NetResult<()> {
        let mut guard = self.name.lock().await;
        if let Some(existing) = &*guard {
            return Err(NetError::AlreadyCreated(existing.clone()));
        }

        run("ip", &["link", "add", "dev", name, "type", "wireguard"]).await?;
        run(
            "ip",
            &["addr", "add", &format!("{address}/32"), "dev", name],
        )
        .await?;
        run("ip", &["link", "set", "up", "dev", name]).await?;

        *guard = Some(name.to_string());
        Ok(())
    }

    async fn configure(&self, private_key: &str, listen_port: u16) -> NetResult<()> {
        let name = self.interface_name().await?;

        let mut key_file = tempfile::NamedTempFile::new()?;
        key_file.write_all(private_key.as_bytes())?;
        key_file.flush()?;
        let key_path = key_file.path().to_string_lossy().to_string();

        run(
            "wg",
            &[
                "set",
                &name,
                "private-key",
                &key_path,
                "listen-port",
                &listen_port.to_string(),
            ],
        )
        .await?;
        Ok(())
    }

    async fn add_peer(&self, peer: PeerConfig) -> NetResult<()> {
        let name = self.interface_name().await?;
        if peer.public_key.is_empty() {
            return Err(NetError::InvalidPeer("empty public key".into()));
        }

        let allowed = peer.allowed_ips.join(",");
        let keepalive = peer.persistent_keepalive.unwrap_or(0).to_string();
        let endpoint = peer.endpoint.map(|e| e.to_string());

        let mut args: Vec<&str> = vec!["set", name.as_str(), "peer", peer.public_key.as_str()];
        if let Some(endpoint) = &endpoint {
            args.extend(["endpoint", endpoint.as_str()]);
        }
        args.extend(["persistent-keepalive", keepalive.as_str()]);
        if !allowed.is_empty() {
            args.extend(["allowed-ips", allowed.as_str()]);
        }

        run("wg", &args).await?;
        Ok(())
    }

    async fn remove_peer(&self, public_key: &str) -> NetResult<()> {
        let name = self.interface_name().await?;
        run("wg", &["set", &name, "peer", public_key, "remove"]).await?;
        Ok(())
    }

    async fn stats(&self) -> NetResult<InterfaceStats> {
        let name = self.interface_name().await?;
        let dump = run("wg", &["show", &name, "dump"]).await?;
        Ok(parse_dump(&name, &dump))
    }

    async fn destroy(&self) -> NetResult<()> {
        let mut guard = self.name.lock().await;
        let name = guard.clone().ok_or(NetError::NotCreated)?;
        run("ip", &["link", "del", "dev", &name]).await?;
        *guard = None;
        Ok(())
    }
}

/// Parse `wg show <iface> dump` output.
///
/// The first line describes the interface, every following line one peer:
/// `pubkey psk endpoint allowed-ips latest-handshake rx tx keepalive`.
fn parse_dump(name: &str, dump: &str) -> InterfaceStats {
    let mut lines = dump.lines();

    let (public_key, listen_port) = match lines.next() {
        Some(header) => {
            let fields: Vec<&str> = header.split('\t').collect();
            let key = fields.get(1).unwrap_or(&"").to_string();
            let port = fields.get(2).and_then(|p| p.parse().ok()).unwrap_or(0);
            (key, port)
        }
        None => (String::new(), 0),
    };

    let peers = lines
        .filter_map(|line| {
            let fields: Vec<&str> = line.split('\t').collect();
            let public_key = (*fields.first()?).to_string();
            let endpoint = fields.get(2).and_then(|e| e.parse().ok());
            let allowed_ips = fields
                .get(3)
                .map(|a| a.split(',').map(|s| s.to_string()).collect())
                .unwrap_or_default();
            let persistent_keepalive = fields.get(7).and_then(|k| k.parse().ok());
            Some(PeerStats {
                public_key,
                endpoint,
                allowed_ips,
                persistent_keepalive,
            })
        })
        .collect();

    InterfaceStats {
        name: name.to_string(),
        public_key,
        listen_port,
        peers,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_dump() {
        let dump = "privkey\tIFACEPUB\t51820\toff\n\
                    PEERKEY\t(none)\t1.2.3.4:51820\t10.100.0.2/32,0.0.0.0/0\t0\t0\t0\t25\n";
        let stats = parse_dump("wgmesh0", dump);

        assert_eq!(stats.name, "wgmesh0");
        assert_eq!(stats.public_key, "IFACEPUB");
        assert_eq!(stats.listen_port, 51820);
        assert_eq!(stats.peers.len(), 1);

        let peer = &stats.peers[0];
        assert_eq!(peer.public_key, "PEERKEY");
        assert_eq!(peer.endpoint, Some("1.2.3.4:51820".parse().unwrap()));
        assert_eq!(peer.allowed_ips, vec!["10.100.0.2/32", "0.0.0.0/0"]);
        assert_eq!(peer.persistent_keepalive, Some(25));
    }

    #[test]
    fn test_parse_dump_empty() {
        let stats = parse_dump("wgmesh0", "");
        assert!(stats.peers.is_empty());
        assert_eq!(stats.listen_port, 0);
    }
}
