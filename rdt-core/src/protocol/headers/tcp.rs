use std::{fmt, io, ops};

use super::checksum;
use crate::{Error, ParseError};

/// TCP Segment Header.
///
/// RFC 793 (3.1)
///
/// ```text
///   0                   1                   2                   3
///     0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
///    +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///    |          Source Port          |       Destination Port        |
///    +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///    |                        Sequence Number                        |
///    +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///    |                    Acknowledgment Number                      |
///    +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///    |  Data |           |U|A|P|R|S|F|                               |
///    | Offset| Reserved  |R|C|S|S|Y|I|            Window             |
///    |       |           |G|K|H|T|N|N|                               |
///    +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///    |           Checksum            |         Urgent Pointer        |
///    +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///    |                    Options                    |    Padding    |
///    +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///    |                             data                              |
///    +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TcpHeader {
    /// The source port number.
    src_port: u16,
    /// The destination port number.
    dst_port: u16,
    /// The sequence number of the first data octet in this segment
    /// (except when SYN is present). If SYN is present the sequence number is
    /// the initial sequence number (ISN) and the first data octet is ISN+1.
    seq_number: u32,
    /// If the ACK control bit is set this field contains the value of the next
    /// sequence number the sender of the segment is expecting to receive.
    ack_number: u32,
    /// The data offset (4-bits) indicates the number of 32 bit words in the
    /// TCP Header, followed by 6 reserved bits and the 6 control bits.
    offset_and_control_bits: u16,
    /// The number of data octets beginning with the one indicated in the
    /// acknowledgment field which the sender of this segment is willing to
    /// accept.
    window: u16,
    /// The 16 bit one's complement of the one's complement sum of the pseudo
    /// header, TCP header and payload.
    checksum: u16,
    /// Current value of the urgent pointer as a positive offset from the
    /// sequence number in this segment.
    urgent_pointer: u16,
    /// Options occupying the space between the fixed header and the offset
    /// indicated by `data offset`.
    options: TcpOptions,
}

impl TcpHeader {
    /// Minimum length of an TCP header in bytes.
    pub const MIN_HEADER_LEN: u16 = 20;

    /// Maximum length of an TCP header in bytes (data offset of 15).
    pub const MAX_HEADER_LEN: u16 = 60;

    /// Minimum data offset of a TCP header.
    pub const MIN_DATA_OFFSET: u16 = 5;

    /// Maximum data offset of a TCP header.
    pub const MAX_DATA_OFFSET: u16 = 15;

    /// Creates a new TCP header with the specified source and destination
    /// ports, sequence number, and window size, while setting default values
    /// for other fields.
    pub fn new(src_port: u16, dst_port: u16, seq_number: u32, window: u16) -> Self {
        Self {
            src_port,
            dst_port,
            seq_number,
            window,
            ..Default::default()
        }
    }

    /// Returns the `source port` field of the TCP header.
    pub fn src_port(&self) -> u16 {
        self.src_port
    }

    /// Returns the `destination port` field of the TCP header.
    pub fn dst_port(&self) -> u16 {
        self.dst_port
    }

    /// Returns the `sequence number` field of the TCP header.
    pub fn seq_number(&self) -> u32 {
        self.seq_number
    }

    /// Returns the `acknowledgment number` field of the TCP header.
    pub fn ack_number(&self) -> u32 {
        self.ack_number
    }

    /// Sets the `acknowledgment number` field of the TCP header with the
    /// provided value.
    pub fn set_ack_number(&mut self, ack: u32) {
        self.ack_number = ack;
    }

    /// Returns the `data offset` field of the TCP header.
    ///
    /// To get the header length (including options) in bytes, use
    /// [TcpHeader::header_len].
    pub fn data_offset(&self) -> u8 {
        // Stored in the higher 4 bits.
        (self.offset_and_control_bits >> 12) as u8
    }

    /// Returns the control bits of the TCP header.
    pub fn flags(&self) -> Flags {
        Flags((self.offset_and_control_bits & Flags::MASK) as u8)
    }

    /// Replaces the control bits of the TCP header, keeping the data offset
    /// and reserved bits.
    pub fn set_flags(&mut self, flags: Flags) {
        self.offset_and_control_bits =
            (self.offset_and_control_bits & !Flags::MASK) | flags.bits() as u16;
    }

    /// Returns the `window` field of the TCP header.
    pub fn window(&self) -> u16 {
        self.window
    }

    /// Returns the `checksum` field of the TCP header.
    pub fn checksum(&self) -> u16 {
        self.checksum
    }

    /// Computes and updates the `checksum` field for a segment carrying
    /// `payload` from `src` to `dst`.
    pub fn set_checksum(&mut self, src: [u8; 4], dst: [u8; 4], payload: &[u8]) {
        self.checksum = self.compute_checksum(src, dst, payload);
    }

    /// Returns `true` if the `checksum` field matches the checksum computed
    /// for a segment carrying `payload` from `src` to `dst`.
    pub fn is_valid_checksum(&self, src: [u8; 4], dst: [u8; 4], payload: &[u8]) -> bool {
        self.checksum == self.compute_checksum(src, dst, payload)
    }

    /// Returns the checksum over the pseudo header, this header and
    /// `payload`. For purposes of computing the checksum, the value of the
    /// checksum field is zero.
    pub fn compute_checksum(&self, src: [u8; 4], dst: [u8; 4], payload: &[u8]) -> u16 {
        let tcp_len = (self.header_len() + payload.len()) as u16;
        let pseudo_header = checksum::pseudo_header(src, dst, super::Protocol::Tcp, tcp_len);

        let (mut raw_header, nbytes) = self.to_be_bytes();

        raw_header[16] = 0x00;
        raw_header[17] = 0x00;

        checksum::internet_checksum(&[&pseudo_header, &raw_header[..nbytes], payload])
    }

    /// Returns the `urgent pointer` field of the TCP header.
    pub fn urgent_pointer(&self) -> u16 {
        self.urgent_pointer
    }

    /// Returns the `options` field of the TCP header.
    pub fn options(&self) -> &TcpOptions {
        &self.options
    }

    /// Returns the length of the TCP header in bytes, including options.
    pub fn header_len(&self) -> usize {
        Self::MIN_HEADER_LEN as usize + self.options.len()
    }

    /// Returns the memory representation of the TCP header as a byte array in
    /// big-endian (network) byte order.
    ///
    /// A buffer of size `TcpHeader::MAX_HEADER_LEN` is used as the byte array,
    /// so the number of bytes written is also returned.
    #[allow(clippy::wrong_self_convention)]
    pub fn to_be_bytes(&self) -> ([u8; Self::MAX_HEADER_LEN as usize], usize) {
        let mut raw_header = [0u8; Self::MAX_HEADER_LEN as usize];
        let size = self.header_len();

        raw_header[0..2].copy_from_slice(&self.src_port.to_be_bytes());
        raw_header[2..4].copy_from_slice(&self.dst_port.to_be_bytes());
        raw_header[4..8].copy_from_slice(&self.seq_number.to_be_bytes());
        raw_header[8..12].copy_from_slice(&self.ack_number.to_be_bytes());
        raw_header[12..14].copy_from_slice(&self.offset_and_control_bits.to_be_bytes());
        raw_header[14..16].copy_from_slice(&self.window.to_be_bytes());
        raw_header[16..18].copy_from_slice(&self.checksum.to_be_bytes());
        raw_header[18..20].copy_from_slice(&self.urgent_pointer.to_be_bytes());

        raw_header[20..size].copy_from_slice(self.options.as_slice());

        (raw_header, size)
    }

    /// Writes the TCP header to the given output stream.
    ///
    /// # Note
    ///
    /// The caller must ensure the checksum is computed and updated before
    /// writing the header.
    pub fn write<T: io::Write>(&self, output: &mut T) -> crate::Result<()> {
        let (raw_header, nbytes) = self.to_be_bytes();
        output.write_all(&raw_header[..nbytes])?;

        Ok(())
    }
}

/// Parses the header at the front of a raw segment. Bytes past the length
/// indicated by `data offset` are payload and are left untouched.
impl TryFrom<&[u8]> for TcpHeader {
    type Error = Error;

    fn try_from(segment_raw: &[u8]) -> Result<Self, Self::Error> {
        if segment_raw.len() < Self::MIN_HEADER_LEN as usize {
            return Err(Error::Parse(ParseError::InvalidBufferLength {
                provided: segment_raw.len(),
                min: Self::MIN_HEADER_LEN,
                max: Self::MAX_HEADER_LEN,
            }));
        }

        let offset_and_control_bits = u16::from_be_bytes([segment_raw[12], segment_raw[13]]);
        let data_offset = offset_and_control_bits >> 12;

        // A 4-bit field cannot exceed MAX_DATA_OFFSET.
        if data_offset < Self::MIN_DATA_OFFSET {
            return Err(Error::Parse(ParseError::InvalidDataOffset {
                provided: data_offset,
                min: Self::MIN_DATA_OFFSET,
                max: Self::MAX_DATA_OFFSET,
            }));
        }

        let header_len = (data_offset << 2) as usize;

        // There are less bytes in the buffer than advertised by data offset.
        if header_len > segment_raw.len() {
            return Err(Error::Parse(ParseError::HeaderLengthMismatch {
                provided: segment_raw.len(),
                expected: data_offset << 2,
            }));
        }

        Ok(Self {
            src_port: u16::from_be_bytes([segment_raw[0], segment_raw[1]]),
            dst_port: u16::from_be_bytes([segment_raw[2], segment_raw[3]]),
            seq_number: u32::from_be_bytes([
                segment_raw[4],
                segment_raw[5],
                segment_raw[6],
                segment_raw[7],
            ]),
            ack_number: u32::from_be_bytes([
                segment_raw[8],
                segment_raw[9],
                segment_raw[10],
                segment_raw[11],
            ]),
            offset_and_control_bits,
            window: u16::from_be_bytes([segment_raw[14], segment_raw[15]]),
            checksum: u16::from_be_bytes([segment_raw[16], segment_raw[17]]),
            urgent_pointer: u16::from_be_bytes([segment_raw[18], segment_raw[19]]),
            options: TcpOptions::from_raw(&segment_raw[Self::MIN_HEADER_LEN as usize..header_len]),
        })
    }
}

impl Default for TcpHeader {
    fn default() -> Self {
        Self {
            ack_number: 0,
            // Data Offset = 5, Reserved = 0, no control bits.
            offset_and_control_bits: 0b0101_000000_000000,
            checksum: 0,
            urgent_pointer: 0,
            options: Default::default(),

            src_port: 0,
            dst_port: 0,
            seq_number: 0,
            window: 0,
        }
    }
}

/// Control bits of a TCP header.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Flags(u8);

impl Flags {
    /// Mask of the control bits within the offset/control word.
    const MASK: u16 = 0b0011_1111;

    /// No more data from sender.
    pub const FIN: Flags = Flags(1);
    /// Synchronize sequence numbers.
    pub const SYN: Flags = Flags(1 << 1);
    /// Reset the connection.
    pub const RST: Flags = Flags(1 << 2);
    /// Push function.
    pub const PSH: Flags = Flags(1 << 3);
    /// Acknowledgment field significant.
    pub const ACK: Flags = Flags(1 << 4);
    /// Urgent pointer field significant.
    pub const URG: Flags = Flags(1 << 5);

    /// Returns a set with no control bits.
    pub const fn empty() -> Self {
        Flags(0)
    }

    /// Returns the raw control bits.
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Returns `true` if every bit in `other` is also set in `self`.
    pub const fn contains(self, other: Flags) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns `true` if the FIN bit is set.
    pub const fn fin(self) -> bool {
        self.contains(Self::FIN)
    }

    /// Returns `true` if the SYN bit is set.
    pub const fn syn(self) -> bool {
        self.contains(Self::SYN)
    }

    /// Returns `true` if the RST bit is set.
    pub const fn rst(self) -> bool {
        self.contains(Self::RST)
    }

    /// Returns `true` if the PSH bit is set.
    pub const fn psh(self) -> bool {
        self.contains(Self::PSH)
    }

    /// Returns `true` if the ACK bit is set.
    pub const fn ack(self) -> bool {
        self.contains(Self::ACK)
    }

    /// Returns `true` if the URG bit is set.
    pub const fn urg(self) -> bool {
        self.contains(Self::URG)
    }
}

impl ops::BitOr for Flags {
    type Output = Flags;

    fn bitor(self, rhs: Flags) -> Flags {
        Flags(self.0 | rhs.0)
    }
}

impl ops::BitOrAssign for Flags {
    fn bitor_assign(&mut self, rhs: Flags) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for Flags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [(Flags, &str); 6] = [
            (Flags::URG, "URG"),
            (Flags::ACK, "ACK"),
            (Flags::PSH, "PSH"),
            (Flags::RST, "RST"),
            (Flags::SYN, "SYN"),
            (Flags::FIN, "FIN"),
        ];

        let mut first = true;

        for (flag, name) in NAMES {
            if self.contains(flag) {
                if !first {
                    f.write_str("|")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }

        if first {
            f.write_str("-")?;
        }

        Ok(())
    }
}

/// Options within a TCP header, kept as raw bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TcpOptions {
    /// The total number of bytes occupying the buffer.
    len: usize,
    /// Fixed-size array of raw options bytes.
    buf: [u8; Self::MAX_OPTIONS_LEN],
}

impl TcpOptions {
    /// Maximum length of TCP options in bytes.
    pub const MAX_OPTIONS_LEN: usize = 40;

    /// Kind of the End of Option List option.
    const KIND_EOL: u8 = 0;

    /// Kind of the No-Operation option.
    const KIND_NOP: u8 = 1;

    /// Kind of the Maximum Segment Size option.
    const KIND_MSS: u8 = 2;

    /// Creates a new empty TCP options.
    pub fn new() -> Self {
        Self {
            len: 0,
            buf: [0u8; Self::MAX_OPTIONS_LEN],
        }
    }

    /// Copies raw option bytes, truncating anything past
    /// [TcpOptions::MAX_OPTIONS_LEN].
    fn from_raw(raw: &[u8]) -> Self {
        let len = usize::min(raw.len(), Self::MAX_OPTIONS_LEN);

        let mut buf = [0u8; Self::MAX_OPTIONS_LEN];
        buf[..len].copy_from_slice(&raw[..len]);

        Self { len, buf }
    }

    /// Returns the Maximum Segment Size (MSS) value from the TCP options, if
    /// present.
    pub fn mss(&self) -> Option<u16> {
        let opts = self.as_slice();
        let mut i = 0;

        while i < opts.len() {
            match opts[i] {
                Self::KIND_EOL => return None,
                Self::KIND_NOP => i += 1,
                kind => {
                    let len = *opts.get(i + 1)? as usize;

                    if kind == Self::KIND_MSS {
                        // Length for MSS option must be 0x04 (4 bytes).
                        if len != 4 || i + 4 > opts.len() {
                            return None;
                        }

                        return Some(u16::from_be_bytes([opts[i + 2], opts[i + 3]]));
                    }

                    // Malformed length would loop forever.
                    if len < 2 {
                        return None;
                    }

                    i += len;
                }
            }
        }

        None
    }

    /// Returns the length of the TCP options in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the TCP options contains no bytes.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns an immutable slice containing the TCP options.
    pub fn as_slice(&self) -> &[u8] {
        &self.buf[..self.len]
    }
}

impl Default for TcpOptions {
    fn default() -> Self {
        Self::new()
    }
}
