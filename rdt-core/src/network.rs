//! The unreliable network layer the transport runs on.

use crate::Result;

/// Best-effort datagram delivery between hosts.
///
/// Segments handed to [Network::send] may be lost, reordered or duplicated.
/// Inbound segments flow the other way: whoever owns the network calls
/// [Server::on_segment_received](crate::protocol::Server::on_segment_received)
/// for each one.
pub trait Network {
    /// Sends a raw TCP segment (header and payload, no IPv4 header) to the
    /// host at `dst`.
    fn send(&mut self, segment: &[u8], dst: [u8; 4]) -> Result<()>;

    /// Returns `true` if inbound checksums should not be verified.
    fn ignore_checksum(&self) -> bool {
        false
    }
}
