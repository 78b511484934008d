//! Passive-open server: demultiplexes inbound segments onto connections.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt;
use std::time::Instant;

use log::{debug, info, warn};

use super::connection::{Connection, Disposition};
use super::headers::{TcpHeader, checksum};
use super::timer::TimerQueue;
use super::{Socket, SocketAddr};
use crate::config::{Config, IsnPolicy};
use crate::network::Network;
use crate::{Error, Result};

/// Application hook invoked once for every accepted connection.
pub type AcceptCallback = Box<dyn FnMut(&mut Connection)>;

/// A server listening on one port, owning every connection it accepted.
///
/// The server never reads the clock while handling events; the current time
/// is supplied by the caller of each entry point.
pub struct Server<N> {
    network: N,
    config: Config,
    connections: HashMap<Socket, Connection>,
    on_accept: Option<AcceptCallback>,
    timers: TimerQueue,
    /// Number of connections accepted so far.
    incarnations: u64,
    /// Reference point of the clock-driven ISN.
    epoch: Instant,
}

impl<N: Network> Server<N> {
    /// Creates a server on top of `network` with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(network: N, config: Config) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            network,
            config,
            connections: HashMap::new(),
            on_accept: None,
            timers: TimerQueue::new(),
            incarnations: 0,
            epoch: Instant::now(),
        })
    }

    /// Creates a server listening on `port` with default settings.
    pub fn bind(network: N, port: u16) -> Result<Self> {
        Self::new(network, Config::default().with_port(port))
    }

    /// Registers the hook invoked for each accepted connection, replacing any
    /// earlier one.
    pub fn register_accept_callback<F>(&mut self, callback: F)
    where
        F: FnMut(&mut Connection) + 'static,
    {
        self.on_accept = Some(Box::new(callback));
    }

    /// Processes a raw segment (TCP header and payload) that travelled from
    /// `src` to `dst`.
    ///
    /// Misdirected, corrupted and unknown segments are discarded.
    pub fn on_segment_received(&mut self, src: [u8; 4], dst: [u8; 4], segment: &[u8], now: Instant) {
        let header = match TcpHeader::try_from(segment) {
            Ok(header) => header,
            Err(err) => {
                warn!("discarding malformed segment from {src:?}: {err}");
                return;
            }
        };

        // Not addressed to this server.
        if header.dst_port() != self.config.port {
            return;
        }

        let sock = Socket::from_inbound(
            SocketAddr::new(src, header.src_port()),
            SocketAddr::new(dst, header.dst_port()),
        );

        if !self.network.ignore_checksum() && !checksum::verify(src, dst, segment) {
            warn!(
                "[{sock}] discarding segment with invalid checksum: 0x{:04x}",
                header.checksum()
            );
            return;
        }

        let payload = &segment[header.header_len()..];

        debug!(
            "[{sock}] received segment | seq: {}, ack: {}, flags: {:?}, window: {}, {} bytes of payload",
            header.seq_number(),
            header.ack_number(),
            header.flags(),
            header.window(),
            payload.len()
        );

        if header.flags().syn() {
            self.accept(sock, &header, now);
            return;
        }

        let Some(conn) = self.connections.get_mut(&sock) else {
            warn!("[{sock}] discarding segment for unknown connection");
            return;
        };

        let disposition = conn.on_segment(&header, payload, now);
        Self::flush(&mut self.network, &mut self.timers, conn);

        if disposition == Disposition::Remove {
            self.connections.remove(&sock);
            info!("[{sock}] connection closed by peer");
        }
    }

    /// Delivers every retransmission timer expired at `now`.
    pub fn on_tick(&mut self, now: Instant) {
        while let Some(token) = self.timers.pop_expired(now) {
            match self.connections.get_mut(&token.socket) {
                Some(conn) if conn.incarnation() == token.incarnation => {
                    conn.on_timeout(token.generation, now);
                    Self::flush(&mut self.network, &mut self.timers, conn);
                }
                _ => debug!(
                    "[{}] ignoring retransmission timer of a removed connection",
                    token.socket
                ),
            }
        }
    }

    /// Returns the earliest instant [Server::on_tick] has work to do.
    ///
    /// May report the deadline of a timer that was since cancelled.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.next_deadline()
    }

    /// Sends `data` on the connection identified by `sock`.
    ///
    /// # Errors
    ///
    /// Returns an error if no such connection exists.
    pub fn send(&mut self, sock: &Socket, data: &[u8], now: Instant) -> Result<()> {
        let conn = self
            .connections
            .get_mut(sock)
            .ok_or(Error::UnknownConnection(*sock))?;

        conn.set_now(now);
        conn.send(data);
        Self::flush(&mut self.network, &mut self.timers, conn);

        Ok(())
    }

    /// Sends a `FIN` on the connection identified by `sock`.
    ///
    /// # Errors
    ///
    /// Returns an error if no such connection exists.
    pub fn close(&mut self, sock: &Socket, now: Instant) -> Result<()> {
        let conn = self
            .connections
            .get_mut(sock)
            .ok_or(Error::UnknownConnection(*sock))?;

        conn.set_now(now);
        conn.close();
        Self::flush(&mut self.network, &mut self.timers, conn);

        Ok(())
    }

    /// Returns the connection identified by `sock`.
    pub fn connection(&self, sock: &Socket) -> Option<&Connection> {
        self.connections.get(sock)
    }

    /// Returns `true` if a connection identified by `sock` exists.
    pub fn contains(&self, sock: &Socket) -> bool {
        self.connections.contains_key(sock)
    }

    /// Returns the number of open connections.
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// Returns `true` if there are no open connections.
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Returns the sockets of all open connections, in no particular order.
    pub fn sockets(&self) -> impl Iterator<Item = &Socket> {
        self.connections.keys()
    }

    /// Returns the network the server sends on.
    pub fn network(&self) -> &N {
        &self.network
    }

    /// Returns the network the server sends on.
    pub fn network_mut(&mut self) -> &mut N {
        &mut self.network
    }

    /// Returns the port the server accepts segments on.
    pub fn port(&self) -> u16 {
        self.config.port
    }

    /// Returns the configuration of the server.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Creates a connection for a `SYN`, replacing any connection with the
    /// same socket.
    fn accept(&mut self, sock: Socket, syn: &TcpHeader, now: Instant) {
        let iss = self.initial_seq_number(syn.seq_number(), now);

        self.incarnations = self.incarnations.wrapping_add(1);
        let conn = Connection::accept(sock, syn, iss, &self.config, self.incarnations, now);

        let conn = match self.connections.entry(sock) {
            Entry::Occupied(mut entry) => {
                debug!("[{sock}] SYN replaces existing connection");
                entry.insert(conn);
                entry.into_mut()
            }
            Entry::Vacant(entry) => entry.insert(conn),
        };

        // SYN_ACK goes out before the application sees the connection.
        Self::flush(&mut self.network, &mut self.timers, conn);

        info!("[{sock}] accepted connection");

        if let Some(callback) = self.on_accept.as_mut() {
            callback(conn);
            Self::flush(&mut self.network, &mut self.timers, conn);
        }
    }

    fn initial_seq_number(&self, peer_isn: u32, now: Instant) -> u32 {
        match self.config.isn {
            IsnPolicy::MirrorPeer => peer_isn,
            IsnPolicy::Clock => {
                // RFC 793 (3.3): bound to a clock incremented every 4 microseconds.
                let ticks = now.saturating_duration_since(self.epoch).as_micros() / 4;
                (ticks as u32).wrapping_add(peer_isn)
            }
        }
    }

    /// Hands queued segments to the network and schedules a newly armed
    /// retransmission timer.
    fn flush(network: &mut N, timers: &mut TimerQueue, conn: &mut Connection) {
        let sock = conn.socket();

        for segment in conn.drain_outbox() {
            let raw = match segment.to_be_bytes() {
                Ok(raw) => raw,
                Err(err) => {
                    warn!("[{sock}] failed to serialize segment: {err}");
                    continue;
                }
            };

            if let Err(err) = network.send(&raw, sock.remote().addr) {
                warn!("[{sock}] failed to send segment: {err}");
            }
        }

        if let Some(token) = conn.take_timer_token() {
            timers.schedule(token);
        }
    }
}

impl<N: fmt::Debug> fmt::Debug for Server<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Server")
            .field("network", &self.network)
            .field("config", &self.config)
            .field("connections", &self.connections)
            .field("on_accept", &self.on_accept.is_some())
            .field("timers", &self.timers)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::time::Duration;

    use super::*;
    use crate::protocol::Segment;
    use crate::protocol::headers::Flags;

    const CLIENT: [u8; 4] = [10, 0, 0, 2];
    const SERVER: [u8; 4] = [10, 0, 0, 1];

    #[derive(Debug, Default)]
    struct Recorder {
        sent: Vec<(Segment, [u8; 4])>,
        ignore_checksum: bool,
    }

    impl Network for Recorder {
        fn send(&mut self, segment: &[u8], dst: [u8; 4]) -> Result<()> {
            self.sent.push((Segment::parse(segment)?, dst));
            Ok(())
        }

        fn ignore_checksum(&self) -> bool {
            self.ignore_checksum
        }
    }

    fn raw(src_port: u16, dst_port: u16, seq: u32, ack: u32, flags: Flags, payload: &[u8]) -> Vec<u8> {
        let mut header = TcpHeader::new(src_port, dst_port, seq, 1024);
        header.set_ack_number(ack);
        header.set_flags(flags);

        let mut segment = Segment::new(header, payload);
        segment.seal(CLIENT, SERVER);
        segment.to_be_bytes().unwrap()
    }

    fn client_sock() -> Socket {
        Socket::from_inbound(SocketAddr::new(CLIENT, 5000), SocketAddr::new(SERVER, 7000))
    }

    fn server() -> Server<Recorder> {
        Server::bind(Recorder::default(), 7000).unwrap()
    }

    #[test]
    fn server_rejects_invalid_config() {
        let result = Server::new(Recorder::default(), Config::default().with_mss(0));

        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn syn_is_answered_and_accepted() {
        let now = Instant::now();
        let mut server = server();

        let accepted = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&accepted);
        server.register_accept_callback(move |conn| sink.borrow_mut().push(conn.socket()));

        server.on_segment_received(CLIENT, SERVER, &raw(5000, 7000, 100, 0, Flags::SYN, &[]), now);

        assert_eq!(*accepted.borrow(), vec![client_sock()]);
        assert!(server.contains(&client_sock()));
        assert_eq!(server.len(), 1);

        let sent = &server.network().sent;
        assert_eq!(sent.len(), 1);

        let (syn_ack, dst) = &sent[0];
        assert_eq!(*dst, CLIENT);
        assert_eq!(syn_ack.flags(), Flags::SYN | Flags::ACK);
        assert_eq!(syn_ack.header.seq_number(), 100);
        assert_eq!(syn_ack.header.ack_number(), 101);
        assert_eq!(syn_ack.header.src_port(), 7000);
        assert_eq!(syn_ack.header.dst_port(), 5000);
    }

    #[test]
    fn misdirected_segment_is_ignored() {
        let mut server = server();

        server.on_segment_received(
            CLIENT,
            SERVER,
            &raw(5000, 8080, 100, 0, Flags::SYN, &[]),
            Instant::now(),
        );

        assert!(server.is_empty());
        assert!(server.network().sent.is_empty());
    }

    #[test]
    fn corrupted_checksum_is_dropped() {
        let mut server = server();
        let mut segment = raw(5000, 7000, 100, 0, Flags::SYN, &[]);
        segment[16] ^= 0xff;

        server.on_segment_received(CLIENT, SERVER, &segment, Instant::now());

        assert!(server.is_empty());
        assert!(server.network().sent.is_empty());
    }

    #[test]
    fn checksum_gate_can_be_disabled() {
        let mut server = Server::bind(
            Recorder {
                ignore_checksum: true,
                ..Default::default()
            },
            7000,
        )
        .unwrap();

        let mut segment = raw(5000, 7000, 100, 0, Flags::SYN, &[]);
        segment[16] ^= 0xff;

        server.on_segment_received(CLIENT, SERVER, &segment, Instant::now());

        assert!(server.contains(&client_sock()));
    }

    #[test]
    fn malformed_segment_is_dropped() {
        let mut server = server();

        server.on_segment_received(CLIENT, SERVER, &[0u8; 10], Instant::now());

        assert!(server.is_empty());
    }

    #[test]
    fn unknown_connection_is_dropped() {
        let mut server = server();

        server.on_segment_received(
            CLIENT,
            SERVER,
            &raw(5000, 7000, 101, 101, Flags::ACK, b"data"),
            Instant::now(),
        );

        assert!(server.is_empty());
        assert!(server.network().sent.is_empty());
    }

    #[test]
    fn api_on_unknown_socket_errors() {
        let now = Instant::now();
        let mut server = server();

        assert!(matches!(
            server.send(&client_sock(), b"x", now),
            Err(Error::UnknownConnection(_))
        ));
        assert!(matches!(
            server.close(&client_sock(), now),
            Err(Error::UnknownConnection(_))
        ));
    }

    #[test]
    fn repeated_syn_replaces_connection() {
        let now = Instant::now();
        let mut server = server();

        server.on_segment_received(CLIENT, SERVER, &raw(5000, 7000, 100, 0, Flags::SYN, &[]), now);
        server.on_segment_received(CLIENT, SERVER, &raw(5000, 7000, 900, 0, Flags::SYN, &[]), now);

        assert_eq!(server.len(), 1);
        assert_eq!(server.connection(&client_sock()).unwrap().rcv_nxt(), 901);
    }

    #[test]
    fn timer_of_replaced_connection_is_ignored() {
        let now = Instant::now();
        let mut server = server();
        let sock = client_sock();

        server.on_segment_received(CLIENT, SERVER, &raw(5000, 7000, 100, 0, Flags::SYN, &[]), now);
        server.send(&sock, b"old", now).unwrap();

        server.on_segment_received(CLIENT, SERVER, &raw(5000, 7000, 900, 0, Flags::SYN, &[]), now);
        server.network_mut().sent.clear();

        server.on_tick(now + Duration::from_secs(1));

        assert!(server.network().sent.is_empty());
    }

    #[test]
    fn clock_isn_differs_from_peer() {
        let config = Config::default().with_isn(IsnPolicy::Clock);
        let mut server = Server::new(Recorder::default(), config).unwrap();

        // 1000 ticks of 4 microseconds.
        let later = server.epoch + Duration::from_millis(4);
        server.on_segment_received(CLIENT, SERVER, &raw(5000, 7000, 100, 0, Flags::SYN, &[]), later);

        let (syn_ack, _) = &server.network().sent[0];
        assert_eq!(syn_ack.header.seq_number(), 1100);
        assert_eq!(syn_ack.header.ack_number(), 101);
    }
}
