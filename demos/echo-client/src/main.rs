use std::{
    io::Read,
    net::{SocketAddr, TcpStream},
};

use clap::Parser;
use reactor_codec::{Encoder, FixedHeaderEncoder};
use tracing::info;

#[derive(Parser)]
struct Args {
    /// Server address to connect to.
    #[arg(default_value = "127.0.0.1:8080")]
    addr: SocketAddr,

    /// How many framed messages to send before exiting.
    #[arg(long, default_value_t = 10)]
    count: usize,

    /// Message body to send, suffixed with a counter.
    #[arg(long, default_value = "hello")]
    message: String,
}

fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();
    let args = Args::parse();

    let mut stream = TcpStream::connect(args.addr)?;
    info!(addr = %args.addr, "connected");
    let encoder = FixedHeaderEncoder::default();

    for i in 0..args.count {
        let payload = format!("{}{i}", args.message);
        encoder.encode_to_writer(&mut stream, payload.as_bytes())?;

        let mut header = [0u8; 2];
        stream.read_exact(&mut header)?;
        let len = u16::from_be_bytes(header) as usize;
        let mut body = vec![0u8; len];
        stream.read_exact(&mut body)?;
        info!(sent = %payload, echoed = %String::from_utf8_lossy(&body), "round-trip");
    }

    stream.shutdown(std::net::Shutdown::Both)?;
    Ok(())
}
