//! Representing unique connections through socket addresses.

use std::fmt;

/// An IPv4 address and a port number.
#[derive(Debug, Copy, Clone, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct SocketAddr {
    /// IPv4 address.
    pub addr: [u8; 4],
    /// Port number.
    pub port: u16,
}

impl SocketAddr {
    /// Creates a socket address from an IPv4 address and port.
    pub fn new(addr: [u8; 4], port: u16) -> Self {
        Self { addr, port }
    }
}

impl fmt::Display for SocketAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}:{}",
            self.addr[0], self.addr[1], self.addr[2], self.addr[3], self.port,
        )
    }
}

/// Unique connection identity, the 4-tuple of both socket addresses.
///
/// Stored from the server's perspective: `src` is the local (listening) side
/// and `dst` the remote peer. An inbound segment maps onto a `Socket` with its
/// source and destination swapped.
#[derive(Debug, Copy, Clone, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct Socket {
    /// The local socket address (server IP and listening port).
    pub src: SocketAddr,
    /// The remote socket address (peer IP and port).
    pub dst: SocketAddr,
}

impl Socket {
    /// Returns the connection identity for a segment that travelled from
    /// `peer` to `local`.
    pub fn from_inbound(peer: SocketAddr, local: SocketAddr) -> Self {
        Self {
            src: local,
            dst: peer,
        }
    }

    /// Returns the local socket address.
    pub fn local(&self) -> SocketAddr {
        self.src
    }

    /// Returns the remote socket address.
    pub fn remote(&self) -> SocketAddr {
        self.dst
    }
}

impl fmt::Display for Socket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.src, self.dst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn socket_from_inbound_swaps_perspective() {
        let peer = SocketAddr::new([10, 0, 0, 2], 5000);
        let local = SocketAddr::new([10, 0, 0, 1], 7000);

        let sock = Socket::from_inbound(peer, local);

        assert_eq!(sock.local(), local);
        assert_eq!(sock.remote(), peer);
        assert_eq!(sock.to_string(), "10.0.0.1:7000 -> 10.0.0.2:5000");
    }
}
