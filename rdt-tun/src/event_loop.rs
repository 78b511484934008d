//! Single-threaded event loop feeding TUN packets and timer expirations to a
//! [Server].

use rdt_core::protocol::Server;
use rdt_core::{Error, Result};

use log::{debug, error};

use std::io;
use std::os::unix::io::RawFd;
use std::ptr;
use std::time::Instant;

use crate::errno;
use crate::network::{TunNetwork, decapsulate};
use crate::tun::MTU_SIZE;

/// Total number of events returned each tick (event loop cycle).
const EPOLL_MAX_EVENTS: usize = 2;

/// Blocks `epoll_wait()` until an event occurs.
const EPOLL_TIMEOUT_MS: i32 = -1;

/// File descriptors owned by the loop, closed on drop.
#[derive(Debug)]
struct Fds {
    epoll_fd: RawFd,
    timer_fd: RawFd,
}

impl Drop for Fds {
    fn drop(&mut self) {
        unsafe {
            let _ = libc::close(self.epoll_fd);
            let _ = libc::close(self.timer_fd);
        }
    }
}

/// Runs the server until an unrecoverable I/O error occurs.
///
/// Inbound packets are decapsulated and handed to
/// [Server::on_segment_received]; expired retransmission timers are delivered
/// through [Server::on_tick]. After every event a `timerfd` is re-armed to
/// [Server::next_deadline].
pub fn run(server: &mut Server<TunNetwork>) -> Result<()> {
    let tun_fd = server.network().tun().fd();
    server.network().tun().set_non_blocking()?;

    let timer_fd = init_timer_fd()?;
    let epoll_fd = match init_epoll_fd([tun_fd, timer_fd]) {
        Ok(fd) => fd,
        Err(err) => {
            unsafe {
                let _ = libc::close(timer_fd);
            }
            return Err(err);
        }
    };

    let fds = Fds { epoll_fd, timer_fd };

    // Stores events for ready file descriptors.
    let mut events = [libc::epoll_event { events: 0, u64: 0 }; EPOLL_MAX_EVENTS];
    let mut buf = [0u8; MTU_SIZE];

    loop {
        let rdfs = unsafe {
            libc::epoll_wait(
                fds.epoll_fd,
                events.as_mut_ptr(),
                EPOLL_MAX_EVENTS as i32,
                EPOLL_TIMEOUT_MS,
            )
        };

        if rdfs == -1 {
            if io::Error::last_os_error().kind() == io::ErrorKind::Interrupted {
                continue;
            }

            return Err(errno!("failed to wait on epoll"));
        }

        for event in events.iter().take(rdfs as usize) {
            let fd = event.u64;

            if fd == fds.timer_fd as u64 {
                // Read from the timer to clear the expiration count.
                let mut count = [0u8; 8];
                let _ = unsafe {
                    libc::read(fds.timer_fd, count.as_mut_ptr() as *mut libc::c_void, count.len())
                };

                server.on_tick(Instant::now());
            }

            if fd == tun_fd as u64 {
                let nbytes = match server.network().tun().recv(&mut buf[..]) {
                    Ok(nbytes) => nbytes,
                    Err(Error::Io(err)) if err.kind() == io::ErrorKind::WouldBlock => continue,
                    Err(err) => {
                        error!("failed to read from TUN interface: {err}");
                        return Err(err);
                    }
                };

                let local_addr = server.network().local_addr();

                if let Some((iph, segment)) = decapsulate(&buf[..nbytes], local_addr) {
                    server.on_segment_received(iph.src(), iph.dst(), segment, Instant::now());
                }
            }
        }

        rearm_timer(fds.timer_fd, server.next_deadline())?;
    }
}

/// Arms `timer_fd` to expire at `deadline`, or disarms it if there is none.
fn rearm_timer(timer_fd: RawFd, deadline: Option<Instant>) -> Result<()> {
    let it_value = match deadline {
        Some(deadline) => {
            let remaining = deadline.saturating_duration_since(Instant::now());

            // A zero expiration disarms the timer, so an overdue deadline
            // fires as soon as possible instead.
            libc::timespec {
                tv_sec: remaining.as_secs() as libc::time_t,
                tv_nsec: remaining.subsec_nanos().max(1) as libc::c_long,
            }
        }
        None => libc::timespec {
            tv_sec: 0,
            tv_nsec: 0,
        },
    };

    debug!("timer re-armed for {deadline:?}");

    let time_spec = libc::itimerspec {
        // One-shot, no periodic expiration.
        it_interval: libc::timespec {
            tv_sec: 0,
            tv_nsec: 0,
        },
        it_value,
    };

    if unsafe { libc::timerfd_settime(timer_fd, 0, &time_spec, ptr::null_mut()) } == -1 {
        return Err(errno!("failed to rearm timer"));
    }

    Ok(())
}

/// Creates a disarmed, non-blocking `timer_fd` on the monotonic clock.
fn init_timer_fd() -> Result<RawFd> {
    let timer_fd = unsafe { libc::timerfd_create(libc::CLOCK_MONOTONIC, libc::TFD_NONBLOCK) };
    if timer_fd == -1 {
        return Err(errno!("failed to create timer_fd"));
    }

    Ok(timer_fd)
}

/// Creates an `epoll_fd` and registers the given file descriptors for
/// readability.
fn init_epoll_fd(fds: [RawFd; 2]) -> Result<RawFd> {
    unsafe {
        let mut ev = libc::epoll_event { events: 0, u64: 0 };

        let epoll_fd = libc::epoll_create1(0);
        if epoll_fd == -1 {
            return Err(errno!("failed to create epoll_fd"));
        }

        for fd in fds {
            ev.events = libc::EPOLLIN as u32;
            ev.u64 = fd as u64;

            if libc::epoll_ctl(epoll_fd, libc::EPOLL_CTL_ADD, fd, &mut ev) == -1 {
                let err = errno!("failed to add to epoll interest list");
                let _ = libc::close(epoll_fd);
                return Err(err);
            }
        }

        Ok(epoll_fd)
    }
}
