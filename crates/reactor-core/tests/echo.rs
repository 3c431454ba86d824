use std::{
    io::{Read, Write},
    net::{SocketAddr, TcpStream},
    sync::atomic::{AtomicUsize, Ordering},
    thread,
    time::{Duration, Instant},
};

use reactor_codec::{Encoder, FixedHeaderDecoder, FixedHeaderEncoder};
use reactor_core::{CloseReason, Connection, Handler, Server, ServerConfig};

struct EchoHandler {
    connects: AtomicUsize,
    closes: AtomicUsize,
}

impl EchoHandler {
    fn new() -> Self {
        Self { connects: AtomicUsize::new(0), closes: AtomicUsize::new(0) }
    }
}

impl Handler<()> for EchoHandler {
    fn on_connect(&self, _conn: &Connection<()>) {
        self.connects.fetch_add(1, Ordering::SeqCst);
    }

    fn on_message(&self, conn: &Connection<()>, bytes: &[u8]) {
        let _ = conn.write_framed(bytes);
    }

    fn on_close(&self, _conn: &Connection<()>, _reason: CloseReason) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

fn wait_until(mut cond: impl FnMut() -> bool, timeout: Duration) -> bool {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    cond()
}

fn start_server<H: Handler<()>>(config: ServerConfig, handler: H) -> (Server<H, ()>, SocketAddr) {
    let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
    let mut server = Server::bind(addr, config, handler).expect("bind");
    server.run().expect("run");
    let local = server.local_addr();
    (server, local)
}

fn read_frame(stream: &mut TcpStream) -> Vec<u8> {
    let mut header = [0u8; 2];
    stream.read_exact(&mut header).unwrap();
    let len = u16::from_be_bytes(header) as usize;
    let mut body = vec![0u8; len];
    stream.read_exact(&mut body).unwrap();
    body
}

#[test]
fn echo_single_message() {
    let config = ServerConfig::new().decoder(FixedHeaderDecoder::default()).encoder(FixedHeaderEncoder::default());
    let (mut server, addr) = start_server(config, EchoHandler::new());

    let mut stream = TcpStream::connect(addr).unwrap();
    let encoder = FixedHeaderEncoder::default();
    let mut wire = Vec::new();
    encoder.encode_to_writer(&mut wire, b"hello").unwrap();
    stream.write_all(&wire).unwrap();

    assert_eq!(read_frame(&mut stream), b"hello");
    server.stop();
}

#[test]
fn split_write_is_reassembled_across_reads() {
    let config = ServerConfig::new().decoder(FixedHeaderDecoder::default()).encoder(FixedHeaderEncoder::default());
    let (mut server, addr) = start_server(config, EchoHandler::new());

    let mut stream = TcpStream::connect(addr).unwrap();
    let encoder = FixedHeaderEncoder::default();
    let mut wire = Vec::new();
    encoder.encode_to_writer(&mut wire, b"split-me").unwrap();

    // Header and body arrive in separate TCP segments, with a gap, so the
    // server must hold the partial frame in its buffer across two reads.
    stream.write_all(&wire[..2]).unwrap();
    thread::sleep(Duration::from_millis(20));
    stream.write_all(&wire[2..]).unwrap();

    assert_eq!(read_frame(&mut stream), b"split-me");
    server.stop();
}

#[test]
fn two_frames_in_one_write_both_decode() {
    let config = ServerConfig::new().decoder(FixedHeaderDecoder::default()).encoder(FixedHeaderEncoder::default());
    let (mut server, addr) = start_server(config, EchoHandler::new());

    let mut stream = TcpStream::connect(addr).unwrap();
    let encoder = FixedHeaderEncoder::default();
    let mut wire = Vec::new();
    encoder.encode_to_writer(&mut wire, b"first").unwrap();
    encoder.encode_to_writer(&mut wire, b"second").unwrap();
    stream.write_all(&wire).unwrap();

    assert_eq!(read_frame(&mut stream), b"first");
    assert_eq!(read_frame(&mut stream), b"second");
    server.stop();
}

#[test]
fn idle_connection_is_closed_after_timeout() {
    let config = ServerConfig::new().idle_timeout(Duration::from_millis(100));
    let (mut server, addr) = start_server(config, EchoHandler::new());

    let mut stream = TcpStream::connect(addr).unwrap();
    assert!(wait_until(|| server.live_connections() == 1, Duration::from_millis(500)));

    stream.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
    let mut buf = [0u8; 1];
    let n = stream.read(&mut buf).unwrap();
    assert_eq!(n, 0, "server must shut down the socket once the idle timeout elapses");

    assert!(wait_until(|| server.live_connections() == 0, Duration::from_millis(500)));
    server.stop();
}

#[test]
fn illegal_length_closes_connection_without_echo() {
    let config = ServerConfig::new()
        .read_buffer_len(8)
        .decoder(FixedHeaderDecoder::default())
        .encoder(FixedHeaderEncoder::default());
    let (mut server, addr) = start_server(config, EchoHandler::new());

    let mut stream = TcpStream::connect(addr).unwrap();
    // header_len=2, declared body_len=255 far exceeds cap(8) - header_len(2).
    stream.write_all(&[0x00, 0xFF]).unwrap();

    stream.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
    let mut buf = [0u8; 1];
    let n = stream.read(&mut buf).unwrap();
    assert_eq!(n, 0, "an illegal length must close the connection rather than wait for more bytes");

    server.stop();
}

#[test]
fn many_concurrent_idle_connections_are_tracked_and_released() {
    let (mut server, addr) = start_server(ServerConfig::new(), EchoHandler::new());

    const N: usize = 200;
    let mut clients = Vec::with_capacity(N);
    for _ in 0..N {
        clients.push(TcpStream::connect(addr).unwrap());
    }

    assert!(wait_until(|| server.live_connections() == N as i64, Duration::from_secs(5)));

    drop(clients);

    assert!(wait_until(|| server.live_connections() == 0, Duration::from_secs(5)));
    server.stop();
}
