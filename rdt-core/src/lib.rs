//! The reliable-transport core of a simplified TCP, based on [RFC 793].
//!
//! A [Server](protocol::Server) accepts connections on one port and drives
//! each [Connection](protocol::Connection) through handshake completion,
//! strictly in-order delivery, cumulative acknowledgment and single-timer
//! retransmission. The crate performs no I/O: segments leave through a
//! [Network] implementation, and inbound segments and the current time are
//! handed in by whoever owns the server.
//!
//! This project is experimental and not intended for production use.
//!
//! [RFC 793]: https://www.rfc-editor.org/rfc/rfc793

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![warn(rust_2018_idioms)]

pub mod protocol;

pub mod config;
pub use config::{Config, IsnPolicy};

pub mod network;
pub use network::Network;

pub mod error;
pub use error::{Error, HeaderError, ParseError, Result};
