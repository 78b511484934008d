//! Construction and serialization of TCP segments.

use std::io::Write;

use crate::Result;
use crate::protocol::headers::{Flags, TcpHeader};

/// An outbound or inbound TCP segment: header plus payload.
///
/// The IPv4 layer is not part of the segment; the network layer below adds
/// (or strips) it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// TCP header of the segment.
    pub header: TcpHeader,
    /// Payload of the segment.
    pub payload: Vec<u8>,
}

impl Segment {
    /// Create a new segment given the TCP header and payload.
    pub fn new(header: TcpHeader, payload: &[u8]) -> Self {
        Self {
            header,
            payload: payload.into(),
        }
    }

    /// Parses a raw segment, splitting the header from the payload at the
    /// offset given by the header's `data offset`.
    pub fn parse(raw: &[u8]) -> Result<Self> {
        let header = TcpHeader::try_from(raw)?;
        let payload = &raw[header.header_len()..];

        Ok(Self::new(header, payload))
    }

    /// Returns the control bits of the segment.
    pub fn flags(&self) -> Flags {
        self.header.flags()
    }

    /// Computes the TCP checksum for the segment travelling from `src` to
    /// `dst` and stores it in the header.
    pub fn seal(&mut self, src: [u8; 4], dst: [u8; 4]) {
        self.header.set_checksum(src, dst, &self.payload);
    }

    /// Returns the memory representation of the segment as a vector of bytes
    /// in big-endian (network) byte order.
    #[allow(clippy::wrong_self_convention)]
    pub fn to_be_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(self.header.header_len() + self.payload.len());

        self.header.write(&mut buf)?;
        buf.write_all(&self.payload)?;

        Ok(buf)
    }
}
