//! Internet checksum (RFC 1071) shared by the IPv4 header and TCP segments.
//!
//! The checksum field is the 16 bit one's complement of the one's complement
//! sum of all 16 bit words covered. For TCP the covered bytes are a 96 bit
//! pseudo header followed by the full segment (header and payload).

use super::Protocol;

/// Length of the TCP pseudo header in bytes.
pub const PSEUDO_HEADER_LEN: usize = 12;

/// Builds the pseudo header conceptually prefixed to a TCP segment.
///
/// ```text
///        +--------+--------+--------+--------+
///        |           Source Address          |
///        +--------+--------+--------+--------+
///        |         Destination Address       |
///        +--------+--------+--------+--------+
///        |  zero  |  PTCL  |    TCP Length   |
///        +--------+--------+--------+--------+
/// ```
pub fn pseudo_header(
    src: [u8; 4],
    dst: [u8; 4],
    protocol: Protocol,
    len: u16,
) -> [u8; PSEUDO_HEADER_LEN] {
    let mut pseudo_header = [0u8; PSEUDO_HEADER_LEN];

    pseudo_header[0..4].copy_from_slice(&src);
    pseudo_header[4..8].copy_from_slice(&dst);
    pseudo_header[8] = 0;
    pseudo_header[9] = protocol.into();
    pseudo_header[10..12].copy_from_slice(&len.to_be_bytes());

    pseudo_header
}

/// Returns the complemented one's complement sum of the given byte slices,
/// processed as if they were one contiguous buffer.
///
/// If the chained bytes contain an odd number of octets, the last octet is
/// padded on the right with zeros to form a 16 bit word.
pub fn internet_checksum(chunks: &[&[u8]]) -> u16 {
    let mut bytes = chunks.iter().flat_map(|chunk| chunk.iter());
    let mut sum = 0u32;

    loop {
        let word = match (bytes.next(), bytes.next()) {
            (Some(h), Some(l)) => u16::from_be_bytes([*h, *l]),
            (Some(h), None) => u16::from_be_bytes([*h, 0x00]),
            _ => break,
        };

        sum += word as u32;

        // Handle potential overflow with carry folding.
        if sum > 0xFFFF {
            // Adds the higher 16-bits to the lower 16-bits.
            sum = (sum & 0xFFFF) + (sum >> 16);
        }
    }

    // Handle potential remaining overflow with carry folding.
    while sum > 0xFFFF {
        sum = (sum & 0xFFFF) + (sum >> 16);
    }

    !(sum as u16)
}

/// Computes the checksum over the pseudo header and `segment` exactly as
/// given, including whatever value the checksum field currently holds.
///
/// A segment carrying a correct checksum yields zero.
pub fn compute(src: [u8; 4], dst: [u8; 4], segment: &[u8]) -> u16 {
    let pseudo = pseudo_header(src, dst, Protocol::Tcp, segment.len() as u16);

    internet_checksum(&[&pseudo, segment])
}

/// Returns `true` if the raw `segment` travelling from `src` to `dst` carries
/// a correct checksum.
pub fn verify(src: [u8; 4], dst: [u8; 4], segment: &[u8]) -> bool {
    compute(src, dst, segment) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn internet_checksum_rfc1071_example() {
        // RFC 1071 (3) numerical example.
        let data = [0x00, 0x01, 0xf2, 0x03, 0xf4, 0xf5, 0xf6, 0xf7];

        assert_eq!(internet_checksum(&[&data]), !0xddf2);
    }

    #[test]
    fn internet_checksum_chunk_boundaries_are_transparent() {
        let data = [0x12, 0x34, 0x56, 0x78, 0x9a];

        assert_eq!(
            internet_checksum(&[&data]),
            internet_checksum(&[&data[..1], &data[1..4], &data[4..]])
        );
    }

    #[test]
    fn internet_checksum_odd_length_pads_right() {
        assert_eq!(internet_checksum(&[&[0xab]]), !0xab00);
    }

    #[test]
    fn pseudo_header_layout() {
        let pseudo = pseudo_header([10, 0, 0, 2], [10, 0, 0, 1], Protocol::Tcp, 40);

        assert_eq!(
            pseudo,
            [10, 0, 0, 2, 10, 0, 0, 1, 0, 6, 0x00, 0x28],
        );
    }
}
