use std::io;

use super::checksum::internet_checksum;
use crate::{Error, HeaderError, ParseError};

/// IPv4 Datagram Header.
///
/// Used by network layers that carry transport segments inside IPv4
/// datagrams. IPv4 options are not supported.
///
/// RFC 791 (3.1)
///
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |Version|  IHL  |Type of Service|          Total Length         |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |         Identification        |Flags|      Fragment Offset    |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |  Time to Live |    Protocol   |         Header Checksum       |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                       Source Address                          |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                    Destination Address                        |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ipv4Header {
    /// Version (high nibble) and Internet Header Length in 32-bit words (low
    /// nibble).
    version_ihl: u8,
    /// Type of service.
    tos: u8,
    /// Length of the datagram in octets, including header and payload.
    total_len: u16,
    /// Identifying value assigned by the sender to aid in assembling
    /// fragments.
    id: u16,
    /// Control flags (reserved, DF, MF) and the 13-bit fragment offset.
    flags_and_offset: u16,
    /// Maximum time the datagram is allowed to remain in the internet system.
    ttl: u8,
    /// Next level protocol used in the data portion of the datagram.
    protocol: Protocol,
    /// A checksum on the header only.
    header_checksum: u16,
    /// The source address.
    src_addr: [u8; 4],
    /// The destination address.
    dst_addr: [u8; 4],
}

impl Ipv4Header {
    /// Length of an IPv4 header without options in bytes.
    pub const MIN_HEADER_LEN: u16 = 20;

    /// Maximum length of an IPv4 header in bytes (IHL of 15).
    pub const MAX_HEADER_LEN: u16 = 60;

    /// Maximum payload length in bytes, accounting for the header length.
    pub const MAX_PAYLOAD_LEN: u16 = u16::MAX - Self::MIN_HEADER_LEN;

    /// Creates a new IPv4 header with the specified source and destination
    /// addresses, payload length, TTL, and protocol, while setting default
    /// values for other fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the `payload_len` exceeds the maximum allowed
    /// payload length.
    pub fn new(
        src: [u8; 4],
        dst: [u8; 4],
        payload_len: u16,
        ttl: u8,
        protocol: Protocol,
    ) -> crate::Result<Self> {
        let mut header = Self {
            ttl,
            protocol,
            src_addr: src,
            dst_addr: dst,
            ..Default::default()
        };

        header.set_payload_len(payload_len)?;

        Ok(header)
    }

    /// Returns the `version` field of the IPv4 header.
    pub fn version(&self) -> u8 {
        self.version_ihl >> 4
    }

    /// Returns the `IHL` field of the IPv4 header, in 32-bit words.
    ///
    /// To get the header length in bytes, use [Ipv4Header::header_len].
    pub fn ihl(&self) -> u8 {
        self.version_ihl & 0xF
    }

    /// Returns the `type of service` field of the IPv4 header.
    pub fn tos(&self) -> u8 {
        self.tos
    }

    /// Returns the `total length` field of the IPv4 header.
    pub fn total_len(&self) -> u16 {
        self.total_len
    }

    /// Sets the `total length` field of the IPv4 header given a payload length.
    ///
    /// # Errors
    ///
    /// Returns an error if the `payload_len` exceeds the maximum allowed
    /// payload length.
    pub fn set_payload_len(&mut self, payload_len: u16) -> crate::Result<()> {
        if payload_len > Self::MAX_PAYLOAD_LEN {
            return Err(Error::Header(HeaderError::PayloadTooLarge {
                provided: payload_len,
                max: Self::MAX_PAYLOAD_LEN,
            }));
        }

        self.total_len = Self::MIN_HEADER_LEN + payload_len;

        Ok(())
    }

    /// Returns the `identification` field of the IPv4 header.
    pub fn id(&self) -> u16 {
        self.id
    }

    /// Returns `true` if the `DF` (Don't Fragment) bit is set.
    pub fn dont_fragment(&self) -> bool {
        (self.flags_and_offset >> 14) & 1 == 1
    }

    /// Returns `true` if the `MF` (More Fragments) bit is set.
    pub fn more_fragments(&self) -> bool {
        (self.flags_and_offset >> 13) & 1 == 1
    }

    /// Returns the `fragment offset` field of the IPv4 header.
    pub fn fragment_offset(&self) -> u16 {
        self.flags_and_offset & 0x1FFF
    }

    /// Returns the `time to live` field of the IPv4 header.
    pub fn ttl(&self) -> u8 {
        self.ttl
    }

    /// Returns the `protocol` field of the IPv4 header.
    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    /// Returns the `header checksum` field of the IPv4 header.
    pub fn header_checksum(&self) -> u16 {
        self.header_checksum
    }

    /// Computes and updates the header checksum for the IPv4 header.
    pub fn set_header_checksum(&mut self) {
        self.header_checksum = self.compute_header_checksum();
    }

    /// Returns `true` if the IPv4 header checksum is valid.
    pub fn is_valid_checksum(&self) -> bool {
        self.header_checksum == self.compute_header_checksum()
    }

    /// Returns the `source address` field of the IPv4 header.
    pub fn src(&self) -> [u8; 4] {
        self.src_addr
    }

    /// Returns the `destination address` field of the IPv4 header.
    pub fn dst(&self) -> [u8; 4] {
        self.dst_addr
    }

    /// Returns the length of the IPv4 header in bytes, not including payload.
    pub fn header_len(&self) -> usize {
        Self::MIN_HEADER_LEN as usize
    }

    /// Returns the payload length indicated by the IPv4 header.
    pub fn payload_len(&self) -> u16 {
        // total_len >= (IHL << 2) is checked when parsing.
        self.total_len - Self::MIN_HEADER_LEN
    }

    /// Returns the computed checksum of the IPv4 header, with the checksum
    /// field taken as zero.
    pub fn compute_header_checksum(&self) -> u16 {
        let mut header_bytes = self.to_be_bytes();

        header_bytes[10] = 0x00;
        header_bytes[11] = 0x00;

        internet_checksum(&[&header_bytes])
    }

    /// Returns the memory representation of the IPv4 header as a byte array in
    /// big-endian (network) byte order.
    #[allow(clippy::wrong_self_convention)]
    pub fn to_be_bytes(&self) -> [u8; Self::MIN_HEADER_LEN as usize] {
        let mut raw_header = [0u8; Self::MIN_HEADER_LEN as usize];

        raw_header[0] = self.version_ihl;
        raw_header[1] = self.tos;
        raw_header[2..4].copy_from_slice(&self.total_len.to_be_bytes());
        raw_header[4..6].copy_from_slice(&self.id.to_be_bytes());
        raw_header[6..8].copy_from_slice(&self.flags_and_offset.to_be_bytes());
        raw_header[8] = self.ttl;
        raw_header[9] = self.protocol.into();
        raw_header[10..12].copy_from_slice(&self.header_checksum.to_be_bytes());
        raw_header[12..16].copy_from_slice(&self.src_addr);
        raw_header[16..20].copy_from_slice(&self.dst_addr);

        raw_header
    }

    /// Writes the IPv4 header to the given output stream.
    ///
    /// # Note
    ///
    /// The caller must ensure the checksum is computed and updated before
    /// writing the header.
    pub fn write<T: io::Write>(&self, output: &mut T) -> crate::Result<()> {
        Ok(output.write_all(&self.to_be_bytes())?)
    }
}

impl TryFrom<&[u8]> for Ipv4Header {
    type Error = Error;

    fn try_from(header_raw: &[u8]) -> Result<Self, Self::Error> {
        if header_raw.len() < Self::MIN_HEADER_LEN as usize {
            return Err(Error::Parse(ParseError::InvalidBufferLength {
                provided: header_raw.len(),
                min: Self::MIN_HEADER_LEN,
                max: Self::MAX_HEADER_LEN,
            }));
        }

        let version_ihl = header_raw[0];

        if (version_ihl >> 4) != 4 {
            return Err(Error::Parse(ParseError::InvalidVersion {
                provided: version_ihl >> 4,
                expected: 4,
            }));
        }

        if (version_ihl & 0xF) != 5 {
            return Err(Error::Parse(ParseError::InvalidIhl {
                provided: version_ihl & 0xF,
                expected: 5,
            }));
        }

        let total_len = u16::from_be_bytes([header_raw[2], header_raw[3]]);

        if total_len < ((version_ihl & 0xF) << 2) as u16 {
            return Err(Error::Parse(ParseError::InvalidTotalLength {
                provided: total_len,
                expected: ((version_ihl & 0xF) << 2),
            }));
        }

        Ok(Self {
            version_ihl,
            tos: header_raw[1],
            total_len,
            id: u16::from_be_bytes([header_raw[4], header_raw[5]]),
            flags_and_offset: u16::from_be_bytes([header_raw[6], header_raw[7]]),
            ttl: header_raw[8],
            protocol: Protocol::from(header_raw[9]),
            header_checksum: u16::from_be_bytes([header_raw[10], header_raw[11]]),
            src_addr: [
                header_raw[12],
                header_raw[13],
                header_raw[14],
                header_raw[15],
            ],
            dst_addr: [
                header_raw[16],
                header_raw[17],
                header_raw[18],
                header_raw[19],
            ],
        })
    }
}

impl Default for Ipv4Header {
    fn default() -> Self {
        Self {
            // Version = 4, IHL = 5
            version_ihl: 0b0100_0101,
            tos: 0,
            id: 0,
            // Don't Fragment, fragment offset 0.
            flags_and_offset: 0b010_0000000000000,
            header_checksum: 0,

            total_len: Self::MIN_HEADER_LEN,
            ttl: 0,
            protocol: Protocol::Tcp,
            src_addr: [0; 4],
            dst_addr: [0; 4],
        }
    }
}

/// Assigned Internet Protocol Numbers (RFC 1700) relevant to this stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    /// Internet Control Message
    Icmp,
    /// Transmission Control
    Tcp,
    /// User Datagram
    Udp,
    /// Any other protocol number.
    Other(u8),
}

impl From<Protocol> for u8 {
    fn from(proto: Protocol) -> u8 {
        match proto {
            Protocol::Icmp => 1,
            Protocol::Tcp => 6,
            Protocol::Udp => 17,
            Protocol::Other(val) => val,
        }
    }
}

impl From<u8> for Protocol {
    fn from(val: u8) -> Self {
        match val {
            1 => Protocol::Icmp,
            6 => Protocol::Tcp,
            17 => Protocol::Udp,
            val => Protocol::Other(val),
        }
    }
}
