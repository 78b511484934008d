//! `rdt-echo`: echoes every payload received on the listening port back to
//! the peer, closing its side once the peer closes.
//!
//! The TUN device must exist and be up before starting, for example:
//!
//!     sudo ip tuntap add dev tun0 mode tun user $USER
//!     sudo ip addr add 10.0.0.2/24 dev tun0
//!     sudo ip link set tun0 up
//!
//! The transport then answers as `10.0.0.1` (see `--addr`):
//!
//!     RUST_LOG=debug cargo r --release --bin rdt-echo
//!     nc 10.0.0.1 7000

use std::net::Ipv4Addr;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use log::{error, info};

use rdt_core::protocol::Server;
use rdt_core::{Config, IsnPolicy, Result};
use rdt_tun::event_loop;
use rdt_tun::network::TunNetwork;
use rdt_tun::tun::{DEFAULT_DEVICE, Tun};

/// Echo server over a simplified reliable transport on a TUN device.
#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Cli {
    /// TUN device to attach to.
    #[arg(long, default_value = DEFAULT_DEVICE)]
    dev: String,

    /// Address the server answers on.
    #[arg(long, default_value = "10.0.0.1")]
    addr: Ipv4Addr,

    /// Port to accept connections on.
    #[arg(short, long, default_value_t = rdt_core::config::DEFAULT_PORT)]
    port: u16,

    /// Maximum payload bytes per outbound segment.
    #[arg(long, default_value_t = rdt_core::config::DEFAULT_MSS)]
    mss: usize,

    /// Retransmission timeout in milliseconds.
    #[arg(long, default_value_t = 500)]
    rto_ms: u64,

    /// Accept segments without verifying their TCP checksum.
    #[arg(long)]
    ignore_checksum: bool,

    /// Initial sequence number selection.
    #[arg(long, value_enum, default_value_t = Isn::Mirror)]
    isn: Isn,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Isn {
    /// Reuse the peer's initial sequence number.
    Mirror,
    /// Derive it from a 4 microsecond clock.
    Clock,
}

impl From<Isn> for IsnPolicy {
    fn from(isn: Isn) -> Self {
        match isn {
            Isn::Mirror => IsnPolicy::MirrorPeer,
            Isn::Clock => IsnPolicy::Clock,
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = Config::default()
        .with_port(cli.port)
        .with_mss(cli.mss)
        .with_rto(Duration::from_millis(cli.rto_ms))
        .with_isn(cli.isn.into());

    let tun = Tun::open(&cli.dev)?;
    let network = TunNetwork::new(tun, cli.addr.octets()).with_ignore_checksum(cli.ignore_checksum);

    let mut server = Server::new(network, config)?;

    server.register_accept_callback(|conn| {
        info!("[{}] accepted connection", conn.socket());

        conn.register_receive_callback(|conn, payload| {
            if payload.is_empty() {
                info!("[{}] peer closed, closing", conn.socket());
                conn.close();
                return;
            }

            info!(
                "[{}] echoing {} bytes: {}",
                conn.socket(),
                payload.len(),
                String::from_utf8_lossy(payload).escape_debug()
            );
            conn.send(payload);
        });
    });

    info!(
        "listening on {}:{} via {}",
        cli.addr,
        server.port(),
        server.network().tun().name()
    );

    event_loop::run(&mut server)
}

fn main() -> ExitCode {
    // Set RUST_LOG to control verbosity.
    env_logger::init();

    if let Err(err) = run(Cli::parse()) {
        error!("{err}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
