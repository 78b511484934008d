//! Handle to a Linux TUN device.
//!
//! A TUN device exchanges raw IP packets with user space: whatever the kernel
//! routes to the interface can be read from the handle, and whatever is
//! written to it is injected into the kernel's network stack.

use rdt_core::Result;

use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::os::unix::io::{AsRawFd, RawFd};
use std::{mem, ptr};

use crate::errno;

/// Maximum Transmission Unit (`MTU`) of the TUN interface.
pub const MTU_SIZE: usize = 1500;

/// Default name of the TUN device.
pub const DEFAULT_DEVICE: &str = "tun0";

/// TUN (network TUNnel) device opened without packet information, so every
/// read and write carries exactly one IP packet.
#[derive(Debug)]
pub struct Tun {
    fd: File,
    name: String,
}

impl Tun {
    /// Attaches to the TUN device `name`, creating it if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the name does not fit in an interface name, or the
    /// device cannot be opened, for example, due to the absence of
    /// `CAP_NET_ADMIN` privilege.
    pub fn open(name: &str) -> Result<Self> {
        let mut ifr: libc::ifreq = unsafe { mem::zeroed() };

        // Leaves room for the NUL terminator.
        if name.is_empty() || name.len() >= ifr.ifr_name.len() {
            return Err(rdt_core::Error::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("invalid TUN device name: {name:?}"),
            )));
        }

        let fd = OpenOptions::new()
            .read(true)
            .write(true)
            .open("/dev/net/tun")?;

        unsafe {
            ptr::copy_nonoverlapping(
                name.as_ptr(),
                ifr.ifr_name.as_mut_ptr() as *mut u8,
                name.len(),
            );
        }

        // IFF_TUN   - TUN device (no Ethernet headers)
        // IFF_NO_PI - Do not provide packet information
        ifr.ifr_ifru.ifru_flags = (libc::IFF_TUN | libc::IFF_NO_PI) as i16;

        if unsafe { libc::ioctl(fd.as_raw_fd(), libc::TUNSETIFF, &ifr) } == -1 {
            return Err(errno!("failed to attach to TUN device {name}"));
        }

        Ok(Self {
            fd,
            name: name.to_owned(),
        })
    }

    /// Returns the interface name of the device.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the raw file descriptor of the `TUN`.
    pub fn fd(&self) -> RawFd {
        self.fd.as_raw_fd()
    }

    /// Receives an IP packet from the `TUN`.
    ///
    /// The caller must ensure the buffer can hold `MTU_SIZE` bytes.
    pub fn recv(&self, buf: &mut [u8]) -> Result<usize> {
        (&self.fd).read(buf).map_err(|err| err.into())
    }

    /// Sends an IP packet to the `TUN`.
    ///
    /// The kernel may still drop a packet that was written successfully, for
    /// example, one with a bad checksum or an unroutable destination.
    pub fn send(&self, buf: &[u8]) -> Result<usize> {
        (&self.fd).write(buf).map_err(|err| err.into())
    }

    /// Configures the `TUN` to be non-blocking.
    pub fn set_non_blocking(&self) -> Result<()> {
        let fd = self.as_raw_fd();

        // Get the current flags so they can be combined with `O_NONBLOCK`.
        let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
        if flags == -1 {
            return Err(errno!("failed to get flags for TUN file handle"));
        }

        if unsafe { libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) } == -1 {
            return Err(errno!("failed to configure TUN file handle as non-blocking"));
        }

        Ok(())
    }
}

impl AsRawFd for Tun {
    fn as_raw_fd(&self) -> RawFd {
        self.fd.as_raw_fd()
    }
}
