//! Error types for the reliable-transport core, covering segment parsing,
//! header construction, configuration and application API misuse.
//!
//! Protocol faults (bad checksums, out-of-order or misdirected segments) are
//! handled where they are detected and never surface through these types.

use std::{io, result};

use thiserror::Error;

use crate::protocol::Socket;

/// A convenience wrapper around `Result` for `rdt_core::Error`.
pub type Result<T> = result::Result<T, Error>;

/// Set of errors that can occur in the transport core.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Error while reading or writing a segment.
    #[error(transparent)]
    Io(#[from] io::Error),
    /// Error parsing a segment or datagram header.
    #[error(transparent)]
    Parse(#[from] ParseError),
    /// Error creating or manipulating an IPv4 or TCP header.
    #[error(transparent)]
    Header(#[from] HeaderError),
    /// No connection exists for the given socket pair.
    #[error("no connection for {0}")]
    UnknownConnection(Socket),
    /// Rejected configuration value.
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
}

/// Error occurred while trying to parse a TCP segment or IPv4 header.
#[derive(Debug, Error)]
#[non_exhaustive]
#[allow(missing_docs)]
pub enum ParseError {
    /// Input buffer not within the valid range for an IPv4/TCP header.
    #[error(
        "invalid header length: {provided} bytes (not within the valid range: {min}..={max} bytes)"
    )]
    InvalidBufferLength { provided: usize, min: u16, max: u16 },
    /// Invalid IPv4 version.
    #[error("invalid IP version: IPv{provided} (must be IPv{expected})")]
    InvalidVersion { provided: u8, expected: u8 },
    /// Invalid IPv4 IHL.
    #[error(
        "invalid IPv4 IHL: {provided} (must be {expected}, IPv4 options are currently not supported)"
    )]
    InvalidIhl { provided: u8, expected: u8 },
    /// Invalid IPv4 total length.
    ///
    /// Value provided is less than `IHL << 2`.
    #[error(
        "invalid IPv4 total length: {provided} bytes (less than indicated by IHL: {expected} bytes)"
    )]
    InvalidTotalLength { provided: u16, expected: u8 },
    /// Invalid TCP data offset.
    #[error("invalid TCP data offset: {provided} (not within the valid range: {min}..={max})")]
    InvalidDataOffset { provided: u16, min: u16, max: u16 },
    /// Mismatch between the provided and expected TCP header length.
    ///
    /// Value provided is less than `data_offset << 2`.
    #[error(
        "invalid TCP header length: {provided} bytes (less than indicated by data offset: {expected} bytes)"
    )]
    HeaderLengthMismatch { provided: usize, expected: u16 },
}

/// Error occurred while trying to create or manipulate an IPv4 or TCP header.
#[derive(Debug, Error)]
#[non_exhaustive]
#[allow(missing_docs)]
pub enum HeaderError {
    /// Invalid payload length for an IPv4 header.
    #[error(
        "failed to set IPv4 payload length: {provided} bytes (exceeds maximum allowed {max} bytes)"
    )]
    PayloadTooLarge { provided: u16, max: u16 },
}
