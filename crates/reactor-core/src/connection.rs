use std::{
    io::{self, Write},
    net::SocketAddr,
    os::unix::io::{AsRawFd, RawFd},
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicI64, Ordering},
    },
    time::{Duration, Instant},
};

use mio::Registry;
use reactor_codec::{Buffer, Decoder, Encoder};

use crate::{buffer_pool::BufferPool, error::ReadFailure, handler::Handler, timer::TimerHandle};

/// A single accepted connection. Handed to application code as `&Connection<D>`
/// for the duration of a callback; never retained past it (see
/// [`crate::Handler`]). Internally this is the one and only strong owner of
/// the socket and its read buffer: the registry's `Arc<Connection<D>>` is
/// never cloned, so dropping it (on close) deterministically releases both.
///
/// `stream` and `buffer` are deliberately separate locks. `read` holds the
/// buffer lock for the whole decode loop (a decoder may need several passes
/// over the buffer to peel off several frames), and a handler's `on_message`
/// is free to write back on the same connection from inside that loop. If
/// both lived behind one lock, that write would deadlock against the read
/// that is still in progress.
pub struct Connection<D> {
    fd: RawFd,
    remote_addr: SocketAddr,
    stream: Mutex<mio::net::TcpStream>,
    buffer: Mutex<Buffer>,
    last_active: Mutex<Instant>,
    timer: Option<TimerHandle>,
    close_requested: AtomicBool,
    user_data: Mutex<Option<D>>,
    buffer_pool: Arc<BufferPool>,
    live_count: Arc<AtomicI64>,
    decoder: Option<Arc<dyn Decoder>>,
    encoder: Option<Arc<dyn Encoder>>,
}

impl<D> Connection<D> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        stream: mio::net::TcpStream,
        remote_addr: SocketAddr,
        buffer_pool: Arc<BufferPool>,
        live_count: Arc<AtomicI64>,
        decoder: Option<Arc<dyn Decoder>>,
        encoder: Option<Arc<dyn Encoder>>,
        timer: Option<TimerHandle>,
    ) -> Arc<Self> {
        let fd = stream.as_raw_fd();
        let buffer = Buffer::from_slab(buffer_pool.acquire());
        live_count.fetch_add(1, Ordering::Relaxed);
        if let Some(timer) = &timer {
            timer.arm(fd);
        }
        Arc::new(Self {
            fd,
            remote_addr,
            stream: Mutex::new(stream),
            buffer: Mutex::new(buffer),
            last_active: Mutex::new(Instant::now()),
            timer,
            close_requested: AtomicBool::new(false),
            user_data: Mutex::new(None),
            buffer_pool,
            live_count,
            decoder,
            encoder,
        })
    }

    pub fn fd(&self) -> RawFd {
        self.fd
    }

    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    /// Attach application state to this connection, replacing whatever was
    /// there before.
    pub fn set_data(&self, data: D) {
        *self.user_data.lock().unwrap_or_else(|e| e.into_inner()) = Some(data);
    }

    pub fn with_data<R>(&self, f: impl FnOnce(Option<&D>) -> R) -> R {
        f(self.user_data.lock().unwrap_or_else(|e| e.into_inner()).as_ref())
    }

    /// Best-effort raw write. Large or backpressured writes are the
    /// caller's concern. Short writes of a chunk this size are effectively
    /// impossible in practice for the small framed payloads this reactor
    /// targets, and this crate makes no claim about write backpressure.
    pub fn write(&self, bytes: &[u8]) -> io::Result<usize> {
        let mut stream = self.stream.lock().unwrap_or_else(|e| e.into_inner());
        stream.write(bytes)
    }

    pub fn write_with_encoder(&self, encoder: &dyn Encoder, body: &[u8]) -> io::Result<()> {
        let mut stream = self.stream.lock().unwrap_or_else(|e| e.into_inner());
        encoder.encode_to_writer(&mut *stream, body)
    }

    /// Frame and write `body` using the server's configured encoder.
    ///
    /// # Panics
    /// Panics if the server was built without `ServerConfig::encoder`.
    /// Callers that mix framed and raw connections should use
    /// `write_with_encoder` instead.
    pub fn write_framed(&self, body: &[u8]) -> io::Result<()> {
        let encoder = self.encoder.as_deref().expect("write_framed called without a configured encoder");
        self.write_with_encoder(encoder, body)
    }

    /// Half-shutdown for reads: the peer can still read whatever this side
    /// writes, but no further bytes will be accepted on this socket. Exposed
    /// as an advanced API; nothing in this crate's lifecycle wires it into a
    /// state transition, so calling it does not close the connection or
    /// suppress further `Incoming` events (a subsequent read will just see
    /// EOF from the kernel).
    pub fn shutdown_read(&self) -> io::Result<()> {
        let stream = self.stream.lock().unwrap_or_else(|e| e.into_inner());
        stream.shutdown(std::net::Shutdown::Read)
    }

    /// Ask the owning worker to close this connection once the in-flight
    /// callback returns. Safe to call from any thread, including from
    /// within `on_message`/`on_connect` themselves.
    pub fn request_close(&self) {
        self.close_requested.store(true, Ordering::Relaxed);
    }

    pub(crate) fn take_close_requested(&self) -> bool {
        self.close_requested.swap(false, Ordering::Relaxed)
    }

    pub(crate) fn touch(&self) {
        *self.last_active.lock().unwrap_or_else(|e| e.into_inner()) = Instant::now();
        if let Some(timer) = &self.timer {
            timer.arm(self.fd);
        }
    }

    pub(crate) fn idle_for(&self) -> Duration {
        self.last_active.lock().unwrap_or_else(|e| e.into_inner()).elapsed()
    }

    /// Drain every byte currently available without blocking, running it
    /// through `decoder` (or delivering raw reads when none is configured).
    /// Loops until the socket reports `WouldBlock`, per edge-triggered
    /// readiness: a single readiness notification can represent more bytes
    /// than one `read(2)` call returns.
    pub(crate) fn read<H: Handler<D>>(self: &Arc<Self>, handler: &H) -> Result<(), ReadFailure> {
        loop {
            {
                let mut stream = self.stream.lock().unwrap_or_else(|e| e.into_inner());
                let mut buffer = self.buffer.lock().unwrap_or_else(|e| e.into_inner());
                match buffer.read_from(&mut *stream)? {
                    reactor_codec::ReadOutcome::WouldBlock => return Ok(()),
                    reactor_codec::ReadOutcome::Progressed(_) => {}
                }
            }
            self.touch();

            let mut buffer = self.buffer.lock().unwrap_or_else(|e| e.into_inner());
            match &self.decoder {
                Some(dec) => dec.decode(&mut buffer, &mut |bytes| handler.on_message(self, bytes))?,
                None => {
                    let bytes = buffer.read_all();
                    handler.on_message(self, bytes);
                }
            }
        }
    }

    /// Deregister from the poller and shut the socket down. The actual
    /// `close(2)` happens via `TcpStream`'s `Drop`, which runs as part of
    /// this connection's own `Drop` once the registry drops its (sole)
    /// `Arc`; see the module-level note on ownership above.
    pub(crate) fn close(&self, registry: &Registry) {
        let mut stream = self.stream.lock().unwrap_or_else(|e| e.into_inner());
        let _ = registry.deregister(&mut *stream);
        let _ = stream.shutdown(std::net::Shutdown::Both);
    }
}

impl<D> Drop for Connection<D> {
    fn drop(&mut self) {
        let buffer = self.buffer.get_mut().unwrap_or_else(|e| e.into_inner());
        let slab = std::mem::replace(buffer, Buffer::new(0)).into_slab();
        self.buffer_pool.release(slab);
        self.live_count.fetch_sub(1, Ordering::Relaxed);
    }
}
