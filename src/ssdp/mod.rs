//! SSDP discovery: the bridge's multicast presence on the local network.
//!
//! [`DiscoveryListener`] owns the multicast socket and feeds every datagram to
//! a [`DatagramHandler`]; [`DiscoveryResponder`] is the handler that decides
//! which probes get an answer and sends one reply per emulated bridge.

mod listener;
mod packet;
mod responder;

pub use listener::{
    DEFAULT_ADDRESS, DatagramHandler, DiscoveryListener, MAX_DATAGRAM_SIZE, Network,
    ShutdownHandle,
};
pub use packet::{DiscoveryProbe, Headers, ROOT_DEVICE, build_reply};
pub use responder::{DIAL_TARGET, DiscoveryResponder, SEARCH_METHOD};
