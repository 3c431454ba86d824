use std::{net::SocketAddr, sync::Arc, time::Duration};

use clap::Parser;
use reactor_codec::{FixedHeaderDecoder, FixedHeaderEncoder};
use reactor_core::{CloseReason, Connection, Handler, Server, ServerConfig};
use tracing::info;

#[derive(Parser)]
struct Args {
    /// Address to listen on.
    #[arg(default_value = "127.0.0.1:8080")]
    addr: SocketAddr,

    /// Idle connections are closed after this many seconds; 0 disables it.
    #[arg(long, default_value_t = 0)]
    idle_timeout_secs: u64,

    /// Capacity of each connection's read buffer, and the largest frame body accepted.
    #[arg(long, default_value_t = 1024)]
    read_buffer_len: usize,
}

struct EchoHandler;

impl Handler<()> for EchoHandler {
    fn on_connect(&self, conn: &Connection<()>) {
        info!(fd = conn.fd(), addr = %conn.remote_addr(), "connect");
    }

    fn on_message(&self, conn: &Connection<()>, bytes: &[u8]) {
        info!(fd = conn.fd(), len = bytes.len(), "read");
        if let Err(e) = conn.write_framed(bytes) {
            info!(fd = conn.fd(), error = %e, "write failed");
        }
    }

    fn on_close(&self, conn: &Connection<()>, reason: CloseReason) {
        info!(fd = conn.fd(), %reason, "close");
    }
}

fn main() {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();
    let args = Args::parse();

    let mut config = ServerConfig::new()
        .read_buffer_len(args.read_buffer_len)
        .decoder(FixedHeaderDecoder::default())
        .encoder(FixedHeaderEncoder::default());
    if args.idle_timeout_secs > 0 {
        config = config.idle_timeout(Duration::from_secs(args.idle_timeout_secs));
    }

    let mut server = Server::bind(args.addr, config, EchoHandler).expect("bind");
    server.run().expect("run");
    info!(addr = %server.local_addr(), "echo-server listening");

    let stopping = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let flag = stopping.clone();
    ctrlc::set_handler(move || flag.store(true, std::sync::atomic::Ordering::Relaxed))
        .expect("installing Ctrl-C handler");
    while !stopping.load(std::sync::atomic::Ordering::Relaxed) {
        std::thread::sleep(Duration::from_millis(200));
    }

    server.stop();
}
