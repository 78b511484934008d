//! Runs the `rdt-core` transport over a Linux TUN device.
//!
//! [TunNetwork](network::TunNetwork) wraps outbound segments in IPv4 and
//! writes them to the device; [event_loop::run] reads inbound packets and
//! drives a [Server](rdt_core::protocol::Server) and its retransmission
//! timers from a single thread.
//!
//! Not suitable for production use.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![warn(rust_2018_idioms)]

#[cfg(not(target_os = "linux"))]
compile_error!(
    "This crate is only compatible with Linux systems that support TUN/TAP devices and epoll."
);

pub mod event_loop;
pub mod network;
pub mod tun;

/// Creates a [rdt_core::Error::Io] with a message prefixed to the `errno` value.
#[macro_export]
macro_rules! errno {
    ($($arg:tt)+) => {{
        let errno = ::std::io::Error::last_os_error();
        let prefix = format!($($arg)+);

        let msg = format!("{prefix}: {errno}");

        rdt_core::Error::Io(::std::io::Error::new(errno.kind(), msg))
    }};
}
