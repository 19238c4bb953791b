//! Probe filtering and per-bridge replies.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use log::{debug, error, info, warn};

use crate::bridge::BridgeIdentity;
use crate::errors::Error;
use crate::runtime::{AsyncUdpSocket, BoxFuture, UdpSocket};
use crate::ssdp::listener::DatagramHandler;
use crate::ssdp::packet::{DiscoveryProbe, build_reply};

type Result<T> = std::result::Result<T, Error>;

/// The discovery search verb.
pub const SEARCH_METHOD: &str = "M-SEARCH";

/// Search-target token sent by screen-casting clients.
pub const DIAL_TARGET: &str = "dial-multiscreen-org";

/// Answers discovery probes on behalf of a fixed set of bridges.
///
/// A probe is answered when its method is `M-SEARCH`, its search target
/// contains none of the excluded tokens and, if an allow-list is set, its
/// sender is on it. Each configured bridge then gets one reply unicast back
/// to the sender.
#[derive(Debug, Clone)]
pub struct DiscoveryResponder {
    bridges: Vec<BridgeIdentity>,
    excluded_targets: Vec<String>,
    allowed_senders: Option<Vec<IpAddr>>,
}

impl DiscoveryResponder {
    pub fn new(bridges: Vec<BridgeIdentity>) -> Self {
        DiscoveryResponder {
            bridges,
            excluded_targets: vec![DIAL_TARGET.to_string()],
            allowed_senders: None,
        }
    }

    /// Replace the search-target tokens that make a probe ignored.
    pub fn with_excluded_targets(mut self, targets: Vec<String>) -> Self {
        self.excluded_targets = targets;
        self
    }

    /// Only answer probes from these addresses.
    pub fn with_allowed_senders(mut self, senders: Vec<IpAddr>) -> Self {
        self.allowed_senders = Some(senders);
        self
    }

    pub fn bridges(&self) -> &[BridgeIdentity] {
        &self.bridges
    }

    /// Whether `probe` deserves a reply.
    pub fn accepts(&self, probe: &DiscoveryProbe) -> bool {
        if probe.method() != SEARCH_METHOD {
            return false;
        }

        let target = probe.search_target();
        if self
            .excluded_targets
            .iter()
            .any(|token| target.contains(token.as_str()))
        {
            return false;
        }

        match &self.allowed_senders {
            Some(allowed) => allowed.contains(&probe.sender().ip()),
            None => true,
        }
    }

    /// The replies owed for `probe`, one per bridge, in bridge order.
    pub fn replies(&self, probe: &DiscoveryProbe) -> Vec<Vec<u8>> {
        if !self.accepts(probe) {
            return Vec::new();
        }
        self.bridges
            .iter()
            .map(|bridge| build_reply(bridge, probe))
            .collect()
    }

    /// Parse `data`, filter it and send the replies from a fresh socket.
    ///
    /// Returns the number of replies sent. A failed send is logged and the
    /// remaining bridges are still answered.
    pub async fn respond(&self, data: &[u8], sender: SocketAddr) -> usize {
        let probe = match DiscoveryProbe::parse(data, sender) {
            Ok(probe) => probe,
            Err(e) => {
                warn!("SSDP parse error from {}: {}", sender, e);
                return 0;
            }
        };

        if !self.accepts(&probe) {
            debug!(
                "SSDP ignoring {} from {} (ST {:?})",
                probe.method(),
                sender,
                probe.search_target()
            );
            return 0;
        }
        info!(
            "SSDP probe client={} method={} headers={:?}",
            sender,
            probe.method(),
            probe.headers()
        );

        let socket = match reply_socket(sender).await {
            Ok(socket) => socket,
            Err(e) => {
                error!("SSDP reply socket error: {}", e);
                return 0;
            }
        };

        let mut sent = 0;
        for bridge in &self.bridges {
            let reply = build_reply(bridge, &probe);
            match socket.send_to(&reply, sender).await {
                Ok(_) => sent += 1,
                Err(e) => error!(
                    "SSDP reply error for bridge {}: {}",
                    bridge.serial_number(),
                    Error::socket("send_to", e)
                ),
            }
        }
        sent
    }
}

impl DatagramHandler for DiscoveryResponder {
    fn handle<'a>(&'a self, data: &'a [u8], sender: SocketAddr) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            self.respond(data, sender).await;
        })
    }
}

async fn reply_socket(to: SocketAddr) -> Result<UdpSocket> {
    let local: SocketAddr = match to {
        SocketAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
        SocketAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
    };
    UdpSocket::bind(local)
        .await
        .map_err(|e| Error::socket("bind", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use tokio::net::UdpSocket as ClientSocket;
    use uuid::Uuid;

    use crate::ssdp::packet::ROOT_DEVICE;

    fn bridge(serial: &str) -> BridgeIdentity {
        BridgeIdentity::for_address(serial, Uuid::new_v4(), "127.0.0.1:8080")
    }

    fn probe(method: &str, st: &str, from: &str) -> DiscoveryProbe {
        let raw = format!("{method} * HTTP/1.1\r\nHOST: 239.255.255.250:1900\r\nST: {st}\r\n\r\n");
        DiscoveryProbe::parse(raw.as_bytes(), from.parse().unwrap()).unwrap()
    }

    #[test]
    fn test_accepts_search_only() {
        let responder = DiscoveryResponder::new(vec![bridge("A")]);
        assert!(responder.accepts(&probe("M-SEARCH", "ssdp:all", "10.0.0.9:1")));
        assert!(!responder.accepts(&probe("NOTIFY", "ssdp:all", "10.0.0.9:1")));
        assert!(responder.replies(&probe("NOTIFY", ROOT_DEVICE, "10.0.0.9:1")).is_empty());
    }

    #[test]
    fn test_rejects_dial_probes() {
        let responder = DiscoveryResponder::new(vec![bridge("A")]);
        let dial = probe(
            "M-SEARCH",
            "urn:dial-multiscreen-org:service:dial:1",
            "10.0.0.9:1",
        );
        assert!(!responder.accepts(&dial));
    }

    #[test]
    fn test_allow_list() {
        let responder = DiscoveryResponder::new(vec![bridge("A")])
            .with_allowed_senders(vec!["10.0.0.45".parse().unwrap()]);
        assert!(responder.accepts(&probe("M-SEARCH", ROOT_DEVICE, "10.0.0.45:5000")));
        assert!(!responder.accepts(&probe("M-SEARCH", ROOT_DEVICE, "10.0.0.46:5000")));
    }

    #[test]
    fn test_one_reply_per_bridge() {
        let responder = DiscoveryResponder::new(vec![bridge("A"), bridge("B")]);
        let replies = responder.replies(&probe("M-SEARCH", ROOT_DEVICE, "10.0.0.9:1"));
        assert_eq!(replies.len(), 2);
        assert!(String::from_utf8_lossy(&replies[0]).contains("hue-bridgeid: A\r\n"));
        assert!(String::from_utf8_lossy(&replies[1]).contains("hue-bridgeid: B\r\n"));
    }

    #[tokio::test]
    async fn test_respond_unicasts_to_sender() {
        let bridge = bridge("001788FFFE23BFC1");
        let responder = DiscoveryResponder::new(vec![bridge.clone()]);
        let client = ClientSocket::bind("127.0.0.1:0").await.unwrap();
        let client_addr = client.local_addr().unwrap();

        let raw = format!("M-SEARCH * HTTP/1.1\r\nST: {ROOT_DEVICE}\r\n\r\n");
        assert_eq!(responder.respond(raw.as_bytes(), client_addr).await, 1);

        let mut buf = [0u8; 1024];
        let (n, _) = tokio::time::timeout(Duration::from_secs(2), client.recv_from(&mut buf))
            .await
            .unwrap()
            .unwrap();
        let reply = DiscoveryProbe::parse(&buf[..n], client_addr).unwrap();
        assert_eq!(
            reply.headers().get("USN").unwrap(),
            format!("uuid:{}::upnp:rootdevice", bridge.uuid())
        );
    }

    #[tokio::test]
    async fn test_respond_ignores_other_methods() {
        let responder = DiscoveryResponder::new(vec![bridge("A")]);
        let client = ClientSocket::bind("127.0.0.1:0").await.unwrap();
        let client_addr = client.local_addr().unwrap();

        let raw = b"NOTIFY * HTTP/1.1\r\nNT: upnp:rootdevice\r\n\r\n";
        assert_eq!(responder.respond(raw, client_addr).await, 0);

        let mut buf = [0u8; 1024];
        let got = tokio::time::timeout(Duration::from_millis(200), client.recv_from(&mut buf)).await;
        assert!(got.is_err());
    }

    #[tokio::test]
    async fn test_respond_drops_malformed() {
        let responder = DiscoveryResponder::new(vec![bridge("A")]);
        let from: SocketAddr = "127.0.0.1:9".parse().unwrap();
        assert_eq!(responder.respond(b"garbage", from).await, 0);
    }
}
