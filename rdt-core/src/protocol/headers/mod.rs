//! Parsing, serialization, and construction of IPv4/TCP headers.

pub mod checksum;

mod ipv4;
pub use ipv4::{Ipv4Header, Protocol};

mod tcp;
pub use tcp::{Flags, TcpHeader, TcpOptions};
