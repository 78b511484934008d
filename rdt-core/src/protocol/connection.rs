//! Per-connection reliable delivery: in-order receive, cumulative
//! acknowledgment, segmentation and single-slot retransmission.

use std::collections::VecDeque;
use std::fmt;
use std::time::{Duration, Instant};

use log::{debug, warn};

use super::headers::{Flags, TcpHeader};
use super::timer::{RetransmitTimer, TimerToken};
use super::{Segment, Socket};
use crate::config::Config;

/// Our window size advertised to the peer.
const RCV_WND_SIZE: u16 = 4096;

/// Application hook invoked with each in-order payload, and once with an
/// empty payload when the peer closes.
pub type ReceiveCallback = Box<dyn FnMut(&mut Connection, &[u8])>;

/// Phase of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Handshake answered, data may flow in both directions.
    Established,
    /// A `FIN` was sent by the local application.
    FinSent,
    /// The peer's `FIN` was received; the connection is being removed.
    Closed,
}

/// What the owner of a connection should do with it after an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Disposition {
    Keep,
    Remove,
}

/// Send Sequence Space.
///
/// (RFC 793 3.2)
///
/// ```text
///                   1         2          3
///              ----------|----------|----------
///                     SND.UNA    SND.NXT
///
///        1 - old sequence numbers which have been acknowledged
///        2 - sequence numbers of unacknowledged data
///        3 - sequence numbers allowed for new data transmission
/// ```
#[derive(Debug)]
struct SendSeqSpace {
    /// SND.UNA - send unacknowledged
    una: u32,
    /// SND.NXT - send next
    nxt: u32,
    /// ISS     - initial send sequence number
    iss: u32,
}

/// Receive Sequence Space.
#[derive(Debug)]
struct RecvSeqSpace {
    /// RCV.NXT - receive next
    nxt: u32,
    /// RCV.WND - receive window
    wnd: u16,
    /// IRS     - initial receive sequence number
    irs: u32,
}

/// One accepted connection.
///
/// Outbound segments are queued on an internal outbox; the
/// [Server](super::Server) that owns the connection hands them to the
/// network after every event.
pub struct Connection {
    /// Socket addresses of the local and remote TCPs.
    sock: Socket,
    state: ConnectionState,
    /// Distinguishes this connection from earlier ones on the same socket.
    incarnation: u64,
    snd: SendSeqSpace,
    rcv: RecvSeqSpace,
    /// Bytes sent but not yet acknowledged, oldest first.
    unacked: VecDeque<u8>,
    timer: RetransmitTimer,
    mss: usize,
    rto: Duration,
    /// Time of the event being processed.
    now: Instant,
    outbox: VecDeque<Segment>,
    on_receive: Option<ReceiveCallback>,
}

impl Connection {
    /// Creates a connection in response to the peer's `SYN` and queues the
    /// `SYN_ACK`.
    pub(crate) fn accept(
        sock: Socket,
        syn: &TcpHeader,
        iss: u32,
        config: &Config,
        incarnation: u64,
        now: Instant,
    ) -> Self {
        let mut conn = Self {
            sock,
            state: ConnectionState::Established,
            incarnation,
            snd: SendSeqSpace {
                una: iss,
                // The SYN occupies one sequence number.
                nxt: iss.wrapping_add(1),
                iss,
            },
            rcv: RecvSeqSpace {
                nxt: syn.seq_number().wrapping_add(1),
                wnd: RCV_WND_SIZE,
                irs: syn.seq_number(),
            },
            unacked: VecDeque::new(),
            timer: RetransmitTimer::new(),
            mss: config.mss,
            rto: config.rto,
            now,
            outbox: VecDeque::new(),
            on_receive: None,
        };

        // <SEQ=ISS><ACK=RCV.NXT><CTL=SYN,ACK>
        let syn_ack = conn.create_segment(iss, Flags::SYN | Flags::ACK, &[]);
        conn.outbox.push_back(syn_ack);

        debug!(
            "[{}] (LISTEN) received SYN (irs: {}, mss: {:?}), queued SYN_ACK (iss: {}): LISTEN -> Established",
            conn.sock,
            conn.rcv.irs,
            syn.options().mss(),
            conn.snd.iss
        );

        conn
    }

    /// Returns the socket addresses of the connection.
    pub fn socket(&self) -> Socket {
        self.sock
    }

    /// Returns the current phase of the connection.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Returns the oldest unacknowledged sequence number.
    pub fn snd_una(&self) -> u32 {
        self.snd.una
    }

    /// Returns the sequence number of the next byte to send.
    pub fn snd_nxt(&self) -> u32 {
        self.snd.nxt
    }

    /// Returns the next sequence number expected from the peer.
    pub fn rcv_nxt(&self) -> u32 {
        self.rcv.nxt
    }

    /// Returns the number of bytes sent but not yet acknowledged.
    pub fn unacked_len(&self) -> usize {
        self.unacked.len()
    }

    /// Returns `true` if the retransmission timer is armed.
    pub fn is_timer_pending(&self) -> bool {
        self.timer.is_pending()
    }

    /// Returns the Maximum Segment Size used for outbound data.
    pub fn mss(&self) -> usize {
        self.mss
    }

    /// Registers the hook invoked for received data, replacing any earlier
    /// one.
    pub fn register_receive_callback<F>(&mut self, callback: F)
    where
        F: FnMut(&mut Connection, &[u8]) + 'static,
    {
        self.on_receive = Some(Box::new(callback));
    }

    /// Segments `data` into chunks of at most MSS bytes and queues them for
    /// transmission, arming the retransmission timer if it is idle.
    ///
    /// The peer's advertised window is not consulted.
    pub fn send(&mut self, data: &[u8]) {
        if self.state != ConnectionState::Established {
            warn!(
                "[{}] ({:?}) sending {} bytes after close",
                self.sock,
                self.state,
                data.len()
            );
        }

        for chunk in data.chunks(self.mss) {
            // <SEQ=SND.NXT><ACK=RCV.NXT><CTL=ACK>
            let segment = self.create_segment(self.snd.nxt, Flags::ACK, chunk);
            self.outbox.push_back(segment);

            self.snd.nxt = self.snd.nxt.wrapping_add(chunk.len() as u32);
            self.unacked.extend(chunk);
        }

        if !data.is_empty() {
            debug!(
                "[{}] ({:?}) queued {} bytes, SND.NXT: {}, unacked: {}",
                self.sock,
                self.state,
                data.len(),
                self.snd.nxt,
                self.unacked.len()
            );

            self.arm_timer();
        }
    }

    /// Queues a `FIN` carrying the current send sequence number.
    ///
    /// `SND.NXT` is not advanced and the `FIN` is never retransmitted.
    pub fn close(&mut self) {
        match self.state {
            ConnectionState::Established => {
                debug!("[{}] (Established) queued FIN: Established -> FinSent", self.sock);
                self.state = ConnectionState::FinSent;
            }
            state => {
                warn!("[{}] ({state:?}) close called after FIN, queueing FIN", self.sock);
            }
        }

        // <SEQ=SND.NXT><ACK=RCV.NXT><CTL=FIN>
        let fin = self.create_segment(self.snd.nxt, Flags::FIN, &[]);
        self.outbox.push_back(fin);
    }

    /// Processes an inbound segment for this connection.
    pub(crate) fn on_segment(
        &mut self,
        header: &TcpHeader,
        payload: &[u8],
        now: Instant,
    ) -> Disposition {
        self.now = now;

        let seqn = header.seq_number();

        // Only the next in-order segment is accepted; anything else is left
        // for the peer's retransmission timer.
        if seqn != self.rcv.nxt {
            debug!(
                "[{}] ({:?}) discarding out-of-order segment: SEG.SEQ: {}, RCV.NXT: {}",
                self.sock, self.state, seqn, self.rcv.nxt
            );

            return Disposition::Keep;
        }

        let flags = header.flags();

        if flags.fin() {
            self.rcv.nxt = self.rcv.nxt.wrapping_add(1);

            // <SEQ=SND.NXT><ACK=RCV.NXT><CTL=ACK>
            let ack = self.create_segment(self.snd.nxt, Flags::ACK, &[]);
            self.outbox.push_back(ack);

            self.timer.cancel();

            debug!(
                "[{}] ({:?}) received FIN, queued ACK: {:?} -> Closed",
                self.sock, self.state, self.state
            );

            self.state = ConnectionState::Closed;
            self.deliver(&[]);

            return Disposition::Remove;
        }

        self.rcv.nxt = self.rcv.nxt.wrapping_add(payload.len() as u32);

        if !payload.is_empty() {
            debug!(
                "[{}] ({:?}) delivering {} bytes, RCV.NXT: {}",
                self.sock,
                self.state,
                payload.len(),
                self.rcv.nxt
            );

            self.deliver(payload);

            // Follows anything the application queued in reply. The hook
            // cannot move RCV.NXT.
            let ack = self.create_segment(self.snd.nxt, Flags::ACK, &[]);
            self.outbox.push_back(ack);

            return Disposition::Keep;
        }

        if flags.ack() {
            self.on_ack(header.ack_number());
        }

        Disposition::Keep
    }

    /// Processes the expiry of the retransmission timer arming identified by
    /// `generation`, resending the head of the unacknowledged data.
    pub(crate) fn on_timeout(&mut self, generation: u64, now: Instant) {
        if !self.timer.fire(generation) {
            debug!(
                "[{}] ({:?}) ignoring stale retransmission timer (generation: {})",
                self.sock, self.state, generation
            );
            return;
        }

        self.now = now;

        if self.unacked.is_empty() {
            return;
        }

        // Only the oldest segment's worth of data is resent.
        let len = usize::min(self.mss, self.unacked.len());
        let payload: Vec<u8> = self.unacked.iter().take(len).copied().collect();
        let seq = self.snd.nxt.wrapping_sub(self.unacked.len() as u32);

        let segment = self.create_segment(seq, Flags::ACK, &payload);
        self.outbox.push_back(segment);

        debug!(
            "[{}] ({:?}) retransmitting {} bytes from SEQ: {}",
            self.sock, self.state, len, seq
        );

        self.arm_timer();
    }

    /// Handles a pure acknowledgment.
    fn on_ack(&mut self, ackn: u32) {
        let acked = ackn.wrapping_sub(self.snd.una);
        let in_flight = self.snd.nxt.wrapping_sub(self.snd.una);

        // Acknowledges something not yet sent.
        if acked > in_flight {
            debug!(
                "[{}] ({:?}) ignoring unacceptable ACK: SEG.ACK: {}, SND.UNA: {}, SND.NXT: {}",
                self.sock, self.state, ackn, self.snd.una, self.snd.nxt
            );
            return;
        }

        self.timer.cancel();

        // The buffer starts after the SYN, which is never buffered, so only
        // the part of the ACK past the buffer's head trims data.
        let head = self.snd.nxt.wrapping_sub(self.unacked.len() as u32);
        let past_head = ackn.wrapping_sub(head) as usize;
        let trim = if past_head <= self.unacked.len() {
            past_head
        } else {
            0
        };
        self.unacked.drain(..trim);
        self.snd.una = ackn;

        debug!(
            "[{}] ({:?}) received ACK, SND.UNA: {}, unacked: {}",
            self.sock,
            self.state,
            self.snd.una,
            self.unacked.len()
        );

        if !self.unacked.is_empty() {
            self.arm_timer();
        }
    }

    /// Hands `payload` to the application hook, if one is registered.
    fn deliver(&mut self, payload: &[u8]) {
        let Some(mut callback) = self.on_receive.take() else {
            debug!(
                "[{}] ({:?}) no receive callback registered, dropping {} bytes",
                self.sock,
                self.state,
                payload.len()
            );
            return;
        };

        callback(self, payload);

        // Keep a callback the hook registered in its place.
        if self.on_receive.is_none() {
            self.on_receive = Some(callback);
        }
    }

    fn arm_timer(&mut self) {
        if self.timer.arm(self.now + self.rto) {
            debug!(
                "[{}] ({:?}) retransmission timer armed for {:?}",
                self.sock, self.state, self.rto
            );
        }
    }

    /// Builds a sealed segment from the local to the remote socket.
    fn create_segment(&self, seq: u32, flags: Flags, payload: &[u8]) -> Segment {
        let (local, remote) = (self.sock.local(), self.sock.remote());
        let mut header = TcpHeader::new(local.port, remote.port, seq, self.rcv.wnd);

        header.set_ack_number(self.rcv.nxt);
        header.set_flags(flags);

        let mut segment = Segment::new(header, payload);
        segment.seal(local.addr, remote.addr);

        segment
    }

    /// Removes and returns the queued outbound segments.
    pub(crate) fn drain_outbox(&mut self) -> impl Iterator<Item = Segment> + '_ {
        self.outbox.drain(..)
    }

    /// Returns the token for a timer arming not yet handed to the scheduler.
    pub(crate) fn take_timer_token(&mut self) -> Option<TimerToken> {
        self.timer.take_unscheduled(self.sock, self.incarnation)
    }

    pub(crate) fn incarnation(&self) -> u64 {
        self.incarnation
    }

    /// Sets the time used for timer arming by calls made outside of an
    /// inbound event.
    pub(crate) fn set_now(&mut self, now: Instant) {
        self.now = now;
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("sock", &self.sock)
            .field("state", &self.state)
            .field("snd", &self.snd)
            .field("rcv", &self.rcv)
            .field("unacked", &self.unacked.len())
            .field("timer", &self.timer)
            .field("mss", &self.mss)
            .field("outbox", &self.outbox.len())
            .field("on_receive", &self.on_receive.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::protocol::SocketAddr;
    use crate::protocol::headers::checksum;

    const RTO: Duration = Duration::from_millis(500);

    fn sock() -> Socket {
        Socket::from_inbound(
            SocketAddr::new([10, 0, 0, 2], 5000),
            SocketAddr::new([10, 0, 0, 1], 7000),
        )
    }

    fn peer_segment(seq: u32, ack: u32, flags: Flags) -> TcpHeader {
        let mut header = TcpHeader::new(5000, 7000, seq, 1024);
        header.set_ack_number(ack);
        header.set_flags(flags);
        header
    }

    /// Accepts a connection from a peer with ISN 100 and drains the SYN_ACK.
    fn established(mss: usize, now: Instant) -> Connection {
        let config = Config::default().with_mss(mss);
        let mut conn = Connection::accept(
            sock(),
            &peer_segment(100, 0, Flags::SYN),
            100,
            &config,
            0,
            now,
        );

        conn.drain_outbox().for_each(drop);
        conn
    }

    /// Records every payload the connection delivers.
    fn record(conn: &mut Connection) -> Rc<RefCell<Vec<Vec<u8>>>> {
        let received = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&received);

        conn.register_receive_callback(move |_, payload| sink.borrow_mut().push(payload.to_vec()));

        received
    }

    #[test]
    fn accept_queues_syn_ack() {
        let now = Instant::now();
        let mut conn = Connection::accept(
            sock(),
            &peer_segment(100, 0, Flags::SYN),
            100,
            &Config::default(),
            0,
            now,
        );

        let segments: Vec<_> = conn.drain_outbox().collect();
        assert_eq!(segments.len(), 1);

        let syn_ack = &segments[0];
        assert_eq!(syn_ack.flags(), Flags::SYN | Flags::ACK);
        assert_eq!(syn_ack.header.seq_number(), 100);
        assert_eq!(syn_ack.header.ack_number(), 101);
        assert_eq!(syn_ack.header.src_port(), 7000);
        assert_eq!(syn_ack.header.dst_port(), 5000);

        let raw = syn_ack.to_be_bytes().unwrap();
        assert!(checksum::verify([10, 0, 0, 1], [10, 0, 0, 2], &raw));

        assert_eq!(conn.state(), ConnectionState::Established);
        assert_eq!(conn.snd_una(), 100);
        assert_eq!(conn.snd_nxt(), 101);
        assert_eq!(conn.rcv_nxt(), 101);
        assert!(!conn.is_timer_pending());
    }

    #[test]
    fn in_order_payload_is_delivered_then_acked() {
        let now = Instant::now();
        let mut conn = established(1000, now);
        let received = record(&mut conn);

        let disposition = conn.on_segment(&peer_segment(101, 101, Flags::ACK), b"hello", now);

        assert_eq!(disposition, Disposition::Keep);
        assert_eq!(*received.borrow(), vec![b"hello".to_vec()]);
        assert_eq!(conn.rcv_nxt(), 106);

        let segments: Vec<_> = conn.drain_outbox().collect();
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].flags(), Flags::ACK);
        assert_eq!(segments[0].header.ack_number(), 106);
        assert!(segments[0].payload.is_empty());
    }

    #[test]
    fn out_of_order_segment_is_discarded() {
        let now = Instant::now();
        let mut conn = established(1000, now);
        let received = record(&mut conn);

        conn.on_segment(&peer_segment(200, 101, Flags::ACK), b"late", now);

        assert!(received.borrow().is_empty());
        assert_eq!(conn.rcv_nxt(), 101);
        assert_eq!(conn.drain_outbox().count(), 0);
    }

    #[test]
    fn send_segments_by_mss_and_arms_timer_once() {
        let now = Instant::now();
        let mut conn = established(1000, now);

        conn.send(&[7u8; 2500]);

        let segments: Vec<_> = conn.drain_outbox().collect();
        let seqs: Vec<_> = segments.iter().map(|s| s.header.seq_number()).collect();
        let lens: Vec<_> = segments.iter().map(|s| s.payload.len()).collect();

        assert_eq!(seqs, vec![101, 1101, 2101]);
        assert_eq!(lens, vec![1000, 1000, 500]);
        assert!(segments.iter().all(|s| s.flags() == Flags::ACK));
        assert!(segments.iter().all(|s| s.header.ack_number() == 101));

        assert_eq!(conn.snd_nxt(), 2601);
        assert_eq!(conn.unacked_len(), 2500);
        assert!(conn.is_timer_pending());

        let token = conn.take_timer_token().unwrap();
        assert_eq!(token.deadline, now + RTO);

        conn.send(b"more");
        assert!(conn.take_timer_token().is_none());
    }

    #[test]
    fn send_empty_does_not_arm_timer() {
        let now = Instant::now();
        let mut conn = established(1000, now);

        conn.send(&[]);

        assert_eq!(conn.drain_outbox().count(), 0);
        assert!(!conn.is_timer_pending());
    }

    #[test]
    fn cumulative_ack_trims_buffer_and_rearms() {
        let now = Instant::now();
        let mut conn = established(1000, now);

        // Handshake ACK.
        conn.on_segment(&peer_segment(101, 101, Flags::ACK), &[], now);
        assert_eq!(conn.snd_una(), 101);

        conn.send(&[1u8; 3000]);
        let first = conn.take_timer_token().unwrap();

        let later = now + Duration::from_millis(100);
        conn.on_segment(&peer_segment(101, 1101, Flags::ACK), &[], later);

        assert_eq!(conn.unacked_len(), 2000);
        assert_eq!(conn.snd_una(), 1101);
        assert!(conn.is_timer_pending());

        let second = conn.take_timer_token().unwrap();
        assert_ne!(first.generation, second.generation);
        assert_eq!(second.deadline, later + RTO);

        conn.on_segment(&peer_segment(101, 3101, Flags::ACK), &[], later);

        assert_eq!(conn.unacked_len(), 0);
        assert!(!conn.is_timer_pending());
    }

    #[test]
    fn handshake_ack_after_early_send_keeps_data_buffered() {
        let now = Instant::now();
        let mut conn = established(1000, now);

        conn.send(b"hello");
        conn.drain_outbox().for_each(drop);

        // Acknowledges only the SYN.
        conn.on_segment(&peer_segment(101, 101, Flags::ACK), &[], now);

        assert_eq!(conn.snd_una(), 101);
        assert_eq!(conn.unacked_len(), 5);
        assert!(conn.is_timer_pending());

        conn.on_segment(&peer_segment(101, 103, Flags::ACK), &[], now);
        assert_eq!(conn.unacked_len(), 3);

        let token = conn.take_timer_token().unwrap();
        conn.on_timeout(token.generation, token.deadline);

        let segments: Vec<_> = conn.drain_outbox().collect();
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].header.seq_number(), 103);
        assert_eq!(segments[0].payload, b"llo");
    }

    #[test]
    fn ack_beyond_snd_nxt_is_ignored() {
        let now = Instant::now();
        let mut conn = established(1000, now);

        conn.send(b"abc");
        conn.on_segment(&peer_segment(101, 5000, Flags::ACK), &[], now);

        assert_eq!(conn.snd_una(), 100);
        assert_eq!(conn.unacked_len(), 3);
        assert!(conn.is_timer_pending());
    }

    #[test]
    fn timeout_resends_head_of_buffer_only() {
        let now = Instant::now();
        let mut conn = established(1000, now);

        conn.on_segment(&peer_segment(101, 101, Flags::ACK), &[], now);
        conn.send(&[9u8; 2500]);
        conn.drain_outbox().for_each(drop);

        let token = conn.take_timer_token().unwrap();
        conn.on_timeout(token.generation, token.deadline);

        let segments: Vec<_> = conn.drain_outbox().collect();
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].header.seq_number(), 101);
        assert_eq!(segments[0].payload.len(), 1000);
        assert_eq!(segments[0].flags(), Flags::ACK);

        // Re-armed unconditionally.
        assert!(conn.is_timer_pending());
        let rearmed = conn.take_timer_token().unwrap();
        assert_eq!(rearmed.deadline, token.deadline + RTO);
    }

    #[test]
    fn stale_timeout_is_ignored() {
        let now = Instant::now();
        let mut conn = established(1000, now);

        conn.send(b"abc");
        let token = conn.take_timer_token().unwrap();
        conn.drain_outbox().for_each(drop);

        // Fully acknowledges the SYN and data.
        conn.on_segment(&peer_segment(101, 104, Flags::ACK), &[], now);
        conn.on_timeout(token.generation, token.deadline);

        assert_eq!(conn.drain_outbox().count(), 0);
        assert!(!conn.is_timer_pending());
    }

    #[test]
    fn fin_acks_signals_end_of_stream_and_removes() {
        let now = Instant::now();
        let mut conn = established(1000, now);
        let received = record(&mut conn);

        conn.send(b"pending");
        conn.drain_outbox().for_each(drop);

        let disposition = conn.on_segment(&peer_segment(101, 101, Flags::FIN | Flags::ACK), &[], now);

        assert_eq!(disposition, Disposition::Remove);
        assert_eq!(conn.state(), ConnectionState::Closed);
        assert_eq!(*received.borrow(), vec![Vec::<u8>::new()]);
        assert!(!conn.is_timer_pending());

        let segments: Vec<_> = conn.drain_outbox().collect();
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].flags(), Flags::ACK);
        assert_eq!(segments[0].header.ack_number(), 102);
    }

    #[test]
    fn close_sends_fin_without_advancing_snd_nxt() {
        let now = Instant::now();
        let mut conn = established(1000, now);

        conn.send(b"bye");
        conn.drain_outbox().for_each(drop);
        conn.close();

        let segments: Vec<_> = conn.drain_outbox().collect();
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].flags(), Flags::FIN);
        assert_eq!(segments[0].header.seq_number(), 104);
        assert_eq!(segments[0].header.ack_number(), 101);

        assert_eq!(conn.snd_nxt(), 104);
        assert_eq!(conn.state(), ConnectionState::FinSent);

        // Double close is tolerated.
        conn.close();
        assert_eq!(conn.drain_outbox().count(), 1);
    }

    #[test]
    fn callback_can_reply_through_connection() {
        let now = Instant::now();
        let mut conn = established(1000, now);

        conn.register_receive_callback(|conn, payload| conn.send(payload));
        conn.on_segment(&peer_segment(101, 101, Flags::ACK), b"echo", now);

        let segments: Vec<_> = conn.drain_outbox().collect();
        assert_eq!(segments.len(), 2);

        // Data from the callback precedes the cumulative ACK, which carries
        // the send cursor past that data.
        assert_eq!(segments[0].payload, b"echo");
        assert_eq!(segments[0].header.seq_number(), 101);
        assert_eq!(segments[0].header.ack_number(), 105);
        assert!(segments[1].payload.is_empty());
        assert_eq!(segments[1].header.seq_number(), 105);
        assert_eq!(segments[1].header.ack_number(), 105);
        assert!(checksum::verify([10, 0, 0, 1], [10, 0, 0, 2], &segments[1].to_be_bytes().unwrap()));

        assert!(conn.is_timer_pending());
    }

    #[test]
    fn wrapping_sequence_numbers() {
        let now = Instant::now();
        let config = Config::default().with_mss(1000);
        let mut conn = Connection::accept(
            sock(),
            &peer_segment(u32::MAX - 1, 0, Flags::SYN),
            u32::MAX - 1,
            &config,
            0,
            now,
        );
        conn.drain_outbox().for_each(drop);
        let received = record(&mut conn);

        assert_eq!(conn.rcv_nxt(), u32::MAX);

        conn.on_segment(&peer_segment(u32::MAX, u32::MAX, Flags::ACK), b"wrap", now);
        assert_eq!(conn.rcv_nxt(), 3);
        assert_eq!(received.borrow().len(), 1);

        conn.send(b"xyz");
        assert_eq!(conn.snd_nxt(), 2);

        conn.on_segment(&peer_segment(3, 2, Flags::ACK), &[], now);
        assert_eq!(conn.unacked_len(), 0);
        assert_eq!(conn.snd_una(), 2);
    }
}
