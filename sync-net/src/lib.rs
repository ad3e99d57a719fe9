//! Relay protocol and transport
//!
//! The relay server is a pure fan-out: every message a peer sends is
//! rebroadcast verbatim to every other peer, with the server only tracking
//! the roster of announced identities. All sync semantics live in the engine
//! on each client. This crate provides:
//! - the closed [`Packet`] set and its binary wire codec
//! - [`RelayServer`], the fan-out server
//! - [`RelayClient`], a single connection with a roster cache and an
//!   inbound event queue

pub mod client;
pub mod error;
pub mod packet;
pub mod server;
pub mod wire;

pub use client::{NetEvent, RelayClient};
pub use error::{NetError, Result};
pub use packet::{EditKind, EditPacket, Packet, PeerIdentity};
pub use server::RelayServer;
pub use wire::PacketCodec;

use std::net::{IpAddr, Ipv4Addr, UdpSocket};
use std::time::Duration;

/// Wire buffer limit: no frame (and no single line) may reach this size
pub const BUFFER_SIZE: usize = 65536;

/// Default relay port, used when no port is given or validation fails
pub const DEFAULT_PORT: u16 = 54555;

/// The maximum possible port number
pub const MAX_PORT: u32 = 65535;

/// How long a client waits for a connection before giving up
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Parses a port from user input, falling back to [`DEFAULT_PORT`] when the
/// input is blank, unparseable, or outside `[0, 65535]`.
pub fn validate_port(input: &str) -> u16 {
    input
        .trim()
        .parse::<u32>()
        .ok()
        .filter(|port| *port <= MAX_PORT)
        .map(|port| port as u16)
        .unwrap_or(DEFAULT_PORT)
}

/// Resolves the machine's non-loopback LAN address, preferring a site-local
/// one. Uses a connected UDP socket to let the OS pick the outbound
/// interface; no packet is actually sent. Falls back to the unspecified
/// address when the machine has no route.
pub fn lan_ip() -> IpAddr {
    let resolved = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))
        .and_then(|socket| {
            socket.connect((Ipv4Addr::new(8, 8, 8, 8), 53))?;
            socket.local_addr()
        })
        .map(|addr| addr.ip());
    match resolved {
        Ok(ip) if !ip.is_loopback() && !ip.is_unspecified() => ip,
        _ => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_validation_falls_back_to_default() {
        assert_eq!(validate_port("54000"), 54000);
        assert_eq!(validate_port("  8080 "), 8080);
        assert_eq!(validate_port("0"), 0);
        assert_eq!(validate_port("65535"), 65535);
        assert_eq!(validate_port(""), DEFAULT_PORT);
        assert_eq!(validate_port("65536"), DEFAULT_PORT);
        assert_eq!(validate_port("not-a-port"), DEFAULT_PORT);
        assert_eq!(validate_port("-1"), DEFAULT_PORT);
    }

    #[test]
    fn lan_ip_is_never_loopback() {
        assert!(!lan_ip().is_loopback());
    }
}
