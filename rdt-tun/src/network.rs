//! IPv4 encapsulation between the transport and the TUN device.

use log::debug;
use rdt_core::protocol::headers::{Ipv4Header, Protocol};
use rdt_core::{Network, Result};

use crate::tun::Tun;

/// Time to live of outbound datagrams.
pub const DEFAULT_TTL: u8 = 64;

/// [Network] that carries segments as IPv4 datagrams over a TUN device.
#[derive(Debug)]
pub struct TunNetwork {
    tun: Tun,
    local_addr: [u8; 4],
    ignore_checksum: bool,
}

impl TunNetwork {
    /// Creates a network sending from `local_addr` through `tun`.
    pub fn new(tun: Tun, local_addr: [u8; 4]) -> Self {
        Self {
            tun,
            local_addr,
            ignore_checksum: false,
        }
    }

    /// Disables TCP checksum verification of inbound segments.
    pub fn with_ignore_checksum(mut self, ignore: bool) -> Self {
        self.ignore_checksum = ignore;
        self
    }

    /// Returns the underlying TUN device.
    pub fn tun(&self) -> &Tun {
        &self.tun
    }

    /// Returns the address segments are sent from.
    pub fn local_addr(&self) -> [u8; 4] {
        self.local_addr
    }
}

impl Network for TunNetwork {
    fn send(&mut self, segment: &[u8], dst: [u8; 4]) -> Result<()> {
        let packet = encapsulate(self.local_addr, dst, segment)?;
        self.tun.send(&packet)?;

        Ok(())
    }

    fn ignore_checksum(&self) -> bool {
        self.ignore_checksum
    }
}

/// Prefixes `segment` with an IPv4 header carrying it from `src` to `dst`.
///
/// # Errors
///
/// Returns an error if the segment does not fit in one datagram.
pub fn encapsulate(src: [u8; 4], dst: [u8; 4], segment: &[u8]) -> Result<Vec<u8>> {
    // Anything past u16::MAX is rejected by the header as too large.
    let len = u16::try_from(segment.len()).unwrap_or(u16::MAX);

    let mut ip = Ipv4Header::new(src, dst, len, DEFAULT_TTL, Protocol::Tcp)?;
    ip.set_header_checksum();

    let mut packet = Vec::with_capacity(ip.header_len() + segment.len());
    ip.write(&mut packet)?;
    packet.extend_from_slice(segment);

    Ok(packet)
}

/// Extracts the TCP segment of an inbound IPv4 packet addressed to
/// `local_addr`.
///
/// Returns `None`, after logging why, for packets that are malformed, carry
/// another protocol, fail the header checksum or are addressed elsewhere.
pub fn decapsulate(packet: &[u8], local_addr: [u8; 4]) -> Option<(Ipv4Header, &[u8])> {
    let iph = match Ipv4Header::try_from(packet) {
        Ok(iph) => iph,
        Err(err) => {
            debug!("discarding IP packet: {err}");
            return None;
        }
    };

    if iph.protocol() != Protocol::Tcp {
        debug!("discarding IP packet: protocol {:?}", iph.protocol());
        return None;
    }

    if !iph.is_valid_checksum() {
        debug!("discarding IP packet: invalid IPv4 header checksum");
        return None;
    }

    if iph.dst() != local_addr {
        debug!("discarding IP packet: addressed to {:?}", iph.dst());
        return None;
    }

    // The buffer may hold trailing bytes past the datagram.
    let end = usize::min(iph.total_len() as usize, packet.len());
    let segment = &packet[iph.header_len()..end];

    Some((iph, segment))
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOCAL: [u8; 4] = [10, 0, 0, 1];
    const PEER: [u8; 4] = [10, 0, 0, 2];

    #[test]
    fn encapsulate_builds_valid_ipv4() {
        let packet = encapsulate(LOCAL, PEER, &[0xaa; 24]).unwrap();
        let iph = Ipv4Header::try_from(&packet[..]).unwrap();

        assert_eq!(packet.len(), 44);
        assert_eq!(iph.total_len(), 44);
        assert_eq!(iph.ttl(), DEFAULT_TTL);
        assert_eq!(iph.protocol(), Protocol::Tcp);
        assert_eq!(iph.src(), LOCAL);
        assert_eq!(iph.dst(), PEER);
        assert!(iph.is_valid_checksum());
    }

    #[test]
    fn encapsulate_rejects_oversized_segment() {
        assert!(encapsulate(LOCAL, PEER, &vec![0u8; 70_000]).is_err());
    }

    #[test]
    fn decapsulate_returns_segment_for_local_addr() {
        let mut packet = encapsulate(PEER, LOCAL, b"segment").unwrap();
        // Padding past the datagram is not part of the segment.
        packet.extend_from_slice(&[0, 0]);

        let (iph, segment) = decapsulate(&packet, LOCAL).unwrap();

        assert_eq!(iph.src(), PEER);
        assert_eq!(segment, b"segment");
    }

    #[test]
    fn decapsulate_filters_foreign_packets() {
        let packet = encapsulate(PEER, LOCAL, b"segment").unwrap();
        assert!(decapsulate(&packet, [10, 0, 0, 9]).is_none());

        let mut corrupted = packet.clone();
        corrupted[8] = 1;
        assert!(decapsulate(&corrupted, LOCAL).is_none());

        let mut icmp = Ipv4Header::new(PEER, LOCAL, 8, DEFAULT_TTL, Protocol::Icmp).unwrap();
        icmp.set_header_checksum();
        let mut raw = icmp.to_be_bytes().to_vec();
        raw.extend_from_slice(&[0u8; 8]);
        assert!(decapsulate(&raw, LOCAL).is_none());

        assert!(decapsulate(&[0x45, 0x00], LOCAL).is_none());
    }
}
