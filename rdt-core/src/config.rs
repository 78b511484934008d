//! Server and connection tunables.

use std::time::Duration;

use crate::{Error, Result};

/// Default listening port.
pub const DEFAULT_PORT: u16 = 7000;

/// Default Maximum Segment Size (MSS) in bytes, an Ethernet MTU minus the
/// IPv4 and TCP headers.
pub const DEFAULT_MSS: usize = 1460;

/// Largest MSS a segment can carry inside one IPv4 datagram.
pub const MAX_MSS: usize = u16::MAX as usize - 40;

/// Fixed retransmission timeout (`RTO`).
pub const DEFAULT_RTO: Duration = Duration::from_millis(500);

/// How a passively opened connection picks its initial send sequence number.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IsnPolicy {
    /// Reuse the sequence number of the peer's `SYN`.
    #[default]
    MirrorPeer,
    /// RFC 793 (3.3) clock-driven ISN: one tick every 4 microseconds since
    /// the server was created, offset by the peer's ISN.
    Clock,
}

/// Tunables of a [Server](crate::protocol::Server).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Port the server accepts segments on.
    pub port: u16,
    /// Largest payload carried by one outbound segment.
    pub mss: usize,
    /// Retransmission timeout.
    pub rto: Duration,
    /// Initial sequence number selection.
    pub isn: IsnPolicy,
}

impl Config {
    /// Sets the listening port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the Maximum Segment Size.
    pub fn with_mss(mut self, mss: usize) -> Self {
        self.mss = mss;
        self
    }

    /// Sets the retransmission timeout.
    pub fn with_rto(mut self, rto: Duration) -> Self {
        self.rto = rto;
        self
    }

    /// Sets the initial sequence number policy.
    pub fn with_isn(mut self, isn: IsnPolicy) -> Self {
        self.isn = isn;
        self
    }

    /// Checks the configuration for values the transport cannot operate with.
    ///
    /// # Errors
    ///
    /// Returns an error if the MSS is zero or exceeds [MAX_MSS], or the
    /// retransmission timeout is zero.
    pub fn validate(&self) -> Result<()> {
        if self.mss == 0 {
            return Err(Error::InvalidConfig("mss must be greater than zero"));
        }

        if self.mss > MAX_MSS {
            return Err(Error::InvalidConfig("mss does not fit in an IPv4 datagram"));
        }

        if self.rto.is_zero() {
            return Err(Error::InvalidConfig("retransmission timeout must be non-zero"));
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            mss: DEFAULT_MSS,
            rto: DEFAULT_RTO,
            isn: IsnPolicy::default(),
        }
    }
}
