//! Retransmission timer bookkeeping.
//!
//! A connection owns one [RetransmitTimer]; every arming produces a
//! [TimerToken] the server schedules on its [TimerQueue]. Tokens are never
//! removed from the queue when a timer is cancelled or re-armed. Instead each
//! token carries the generation it was issued for, and firing a token whose
//! generation is no longer live is a no-op.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::time::Instant;

use super::Socket;

/// A scheduled expiry for one arming of a connection's retransmission timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct TimerToken {
    /// Instant at which the timer expires.
    pub deadline: Instant,
    /// Connection the timer belongs to.
    pub socket: Socket,
    /// Distinguishes connections reusing the same socket pair after a new
    /// `SYN` replaced an older one.
    pub incarnation: u64,
    /// Arming the token was issued for.
    pub generation: u64,
}

/// Single-slot retransmission timer of a connection.
#[derive(Debug, Default)]
pub struct RetransmitTimer {
    /// Incremented on every arm and cancel.
    generation: u64,
    /// Expiry of the pending arming, if any.
    deadline: Option<Instant>,
    /// Set when the pending arming has not yet been handed to a scheduler.
    unscheduled: bool,
}

impl RetransmitTimer {
    /// Creates a disarmed timer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if the timer is armed.
    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// Returns the expiry of the pending arming.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns the live generation.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Arms the timer to expire at `deadline`, returning `true` if it was
    /// disarmed before. Arming a pending timer leaves it untouched.
    pub fn arm(&mut self, deadline: Instant) -> bool {
        if self.deadline.is_some() {
            return false;
        }

        self.generation = self.generation.wrapping_add(1);
        self.deadline = Some(deadline);
        self.unscheduled = true;

        true
    }

    /// Disarms the timer, returning `true` if it was pending. Any token
    /// already issued becomes stale.
    pub fn cancel(&mut self) -> bool {
        let was_pending = self.deadline.take().is_some();

        self.generation = self.generation.wrapping_add(1);
        self.unscheduled = false;

        was_pending
    }

    /// Consumes an expiry for `generation`, returning `true` if it belongs to
    /// the pending arming. The timer is disarmed afterwards.
    pub fn fire(&mut self, generation: u64) -> bool {
        if self.deadline.is_none() || generation != self.generation {
            return false;
        }

        self.deadline = None;
        self.unscheduled = false;

        true
    }

    /// Returns the token for the pending arming if it has not been handed out
    /// yet.
    pub fn take_unscheduled(&mut self, socket: Socket, incarnation: u64) -> Option<TimerToken> {
        if !self.unscheduled {
            return None;
        }

        self.unscheduled = false;

        self.deadline.map(|deadline| TimerToken {
            deadline,
            socket,
            incarnation,
            generation: self.generation,
        })
    }
}

/// Min-heap of timer tokens ordered by deadline.
///
/// May hold stale tokens; the owner of the timers discards them on expiry.
#[derive(Debug, Default)]
pub struct TimerQueue {
    heap: BinaryHeap<Reverse<TimerToken>>,
}

impl TimerQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a token to the queue.
    pub fn schedule(&mut self, token: TimerToken) {
        self.heap.push(Reverse(token));
    }

    /// Returns the earliest deadline in the queue.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.heap.peek().map(|Reverse(token)| token.deadline)
    }

    /// Removes and returns the earliest token if it expired at or before
    /// `now`.
    pub fn pop_expired(&mut self, now: Instant) -> Option<TimerToken> {
        match self.heap.peek() {
            Some(Reverse(token)) if token.deadline <= now => {
                self.heap.pop().map(|Reverse(token)| token)
            }
            _ => None,
        }
    }
}
