//! Multicast socket ownership and the discovery receive loop.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, ToSocketAddrs};

use futures::StreamExt;
use futures::channel::mpsc;
use futures::future::{self, Either};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use socket2::{Domain, Protocol, Socket, Type};

use crate::errors::Error;
use crate::runtime::{AsyncUdpSocket, BoxFuture, UdpSocket};

type Result<T> = std::result::Result<T, Error>;

pub const DEFAULT_ADDRESS: &str = "239.255.255.250:1900";

/// Datagrams longer than this are truncated.
pub const MAX_DATAGRAM_SIZE: usize = 2048;

/// Address family used to resolve the multicast address.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    #[default]
    Udp4,
    Udp6,
    /// Whichever family the address resolves to first.
    Udp,
}

impl Network {
    fn accepts(self, addr: &SocketAddr) -> bool {
        match self {
            Network::Udp4 => addr.is_ipv4(),
            Network::Udp6 => addr.is_ipv6(),
            Network::Udp => true,
        }
    }
}

/// Receives every datagram read by a [`DiscoveryListener`].
///
/// The listener awaits each call before reading the next datagram.
pub trait DatagramHandler: Send + Sync {
    fn handle<'a>(&'a self, data: &'a [u8], sender: SocketAddr) -> BoxFuture<'a, ()>;
}

/// Stops a running [`DiscoveryListener::read`] loop.
#[derive(Debug, Clone)]
pub struct ShutdownHandle(mpsc::UnboundedSender<()>);

impl ShutdownHandle {
    pub fn shutdown(&self) {
        // The loop may already be gone; nothing to do then
        let _ = self.0.unbounded_send(());
    }
}

/// Owns one UDP socket joined to the discovery multicast group.
pub struct DiscoveryListener {
    socket: UdpSocket,
    group: SocketAddr,
    shutdown_tx: mpsc::UnboundedSender<()>,
    shutdown_rx: mpsc::UnboundedReceiver<()>,
}

impl DiscoveryListener {
    /// Resolve `address`, optionally pin to the interface called `interface`,
    /// bind the group port and join the group.
    ///
    /// Any failure here is fatal for discovery and is returned as is.
    pub fn listen(network: Network, address: &str, interface: Option<&str>) -> Result<Self> {
        let group = resolve(network, address)?;
        let socket = match group.ip() {
            IpAddr::V4(ip) => join_v4(ip, group.port(), interface)?,
            IpAddr::V6(ip) => join_v6(ip, group.port(), interface)?,
        };
        let socket = UdpSocket::from_std(socket).map_err(|e| Error::socket("register", e))?;
        let (shutdown_tx, shutdown_rx) = mpsc::unbounded();

        info!("SSDP listening on {} (interface {:?})", group, interface);
        Ok(DiscoveryListener {
            socket,
            group,
            shutdown_tx,
            shutdown_rx,
        })
    }

    pub fn group(&self) -> SocketAddr {
        self.group
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.socket
            .local_addr()
            .map_err(|e| Error::socket("local_addr", e))
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle(self.shutdown_tx.clone())
    }

    /// Receive datagrams until shut down, handing each one to `handler`.
    ///
    /// Receive errors are skipped. Consumes the listener so the socket is
    /// closed when the loop ends.
    pub async fn read<H: DatagramHandler + ?Sized>(mut self, handler: &H) {
        let mut buffer = [0u8; MAX_DATAGRAM_SIZE];

        loop {
            let received = {
                let recv = self.socket.recv_from(&mut buffer);
                let stop = self.shutdown_rx.next();
                futures::pin_mut!(recv);

                match future::select(recv, stop).await {
                    Either::Left((result, _)) => result,
                    Either::Right(_) => break,
                }
            };

            match received {
                Ok((size, sender)) => handler.handle(&buffer[..size], sender).await,
                Err(e) => debug!("SSDP receive error ignored: {}", e),
            }
        }

        info!("SSDP listener on {} stopped", self.group);
    }
}

fn resolve(network: Network, address: &str) -> Result<SocketAddr> {
    address
        .to_socket_addrs()
        .map_err(|e| Error::Resolve(format!("{address}: {e}")))?
        .find(|addr| network.accepts(addr))
        .ok_or_else(|| Error::Resolve(format!("{address}: no {network:?} address")))
}

fn join_v4(group: Ipv4Addr, port: u16, interface: Option<&str>) -> Result<std::net::UdpSocket> {
    let iface = match interface {
        Some(name) => interface_v4(name)?,
        None => Ipv4Addr::UNSPECIFIED,
    };

    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))
        .map_err(|e| Error::socket("create", e))?;
    socket
        .set_reuse_address(true)
        .map_err(|e| Error::socket("set_reuse_address", e))?;
    let bind_addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
    socket
        .bind(&bind_addr.into())
        .map_err(|e| Error::socket("bind", e))?;
    socket
        .join_multicast_v4(&group, &iface)
        .map_err(|e| Error::socket("join_multicast_v4", e))?;
    debug!("joined {} on interface {}", group, iface);

    Ok(socket.into())
}

fn join_v6(group: Ipv6Addr, port: u16, interface: Option<&str>) -> Result<std::net::UdpSocket> {
    if let Some(name) = interface {
        return Err(Error::Interface(format!(
            "{name}: interface selection is only supported for IPv4"
        )));
    }

    let socket = Socket::new(Domain::IPV6, Type::DGRAM, Some(Protocol::UDP))
        .map_err(|e| Error::socket("create", e))?;
    socket
        .set_reuse_address(true)
        .map_err(|e| Error::socket("set_reuse_address", e))?;
    socket
        .set_only_v6(true)
        .map_err(|e| Error::socket("set_only_v6", e))?;
    let bind_addr = SocketAddr::from((Ipv6Addr::UNSPECIFIED, port));
    socket
        .bind(&bind_addr.into())
        .map_err(|e| Error::socket("bind", e))?;
    socket
        .join_multicast_v6(&group, 0)
        .map_err(|e| Error::socket("join_multicast_v6", e))?;
    debug!("joined {} on default interface", group);

    Ok(socket.into())
}

/// IPv4 address of the interface called `name`.
fn interface_v4(name: &str) -> Result<Ipv4Addr> {
    let interfaces = local_ip_address::list_afinet_netifas()
        .map_err(|e| Error::Interface(format!("{name}: {e}")))?;

    interfaces
        .into_iter()
        .find_map(|(iface, ip)| match ip {
            IpAddr::V4(v4) if iface == name => Some(v4),
            _ => None,
        })
        .ok_or_else(|| Error::Interface(format!("{name}: no IPv4 address")))
}
