//! Reliable transport over [TCP] segments carried by [IPv4].
//!
//! This module implements the header codec, connection identity, the
//! per-connection reliable delivery engine, and the passive-open server that
//! demultiplexes inbound segments onto connections.
//!
//! [TCP]:  https://www.rfc-editor.org/rfc/rfc793
//! [IPv4]: https://www.rfc-editor.org/rfc/rfc791

pub mod headers;

pub mod socket;
pub use socket::{Socket, SocketAddr};

pub mod segment;
pub use segment::Segment;

pub mod timer;

pub mod connection;
pub use connection::{Connection, ConnectionState, ReceiveCallback};

pub mod server;
pub use server::{AcceptCallback, Server};
