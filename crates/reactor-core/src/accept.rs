use std::{
    io,
    net::TcpListener as StdTcpListener,
    os::unix::io::AsRawFd,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicI64, Ordering},
    },
    time::Duration,
};

use mio::Registry as MioRegistry;
use reactor_codec::{Decoder, Encoder};
use tracing::{trace, warn};

use crate::{
    buffer_pool::BufferPool,
    connection::Connection,
    error::CloseReason,
    handler::Handler,
    netpoll::{self, AcceptPoll},
    registry::Registry,
    timer::TimerFactory,
};

/// Body of one accept thread: owns a private poller over a `dup`'d handle to
/// the shared listener, accepts connections as they become ready, and hands
/// each one straight to `on_connect` before any worker can see it.
#[allow(clippy::too_many_arguments)]
pub(crate) fn run<D, H: Handler<D>>(
    thread_id: usize,
    listener: Arc<StdTcpListener>,
    producer_registry: MioRegistry,
    registry: Arc<Registry<D>>,
    buffer_pool: Arc<BufferPool>,
    live_count: Arc<AtomicI64>,
    decoder: Option<Arc<dyn Decoder>>,
    encoder: Option<Arc<dyn Encoder>>,
    timer_factory: Option<TimerFactory>,
    handler: Arc<H>,
    stop: Arc<AtomicBool>,
) {
    let mut accept_poll = match AcceptPoll::new(&listener) {
        Ok(p) => p,
        Err(e) => {
            warn!(error = %e, thread_id, "accept thread failed to start");
            return;
        }
    };

    while !stop.load(Ordering::Relaxed) {
        match accept_poll.accept(Duration::from_millis(200)) {
            Ok((mut stream, addr)) => {
                let fd = stream.as_raw_fd();
                if let Err(e) = netpoll::register_stream(&producer_registry, &mut stream, fd) {
                    warn!(error = %e, fd, "failed to register accepted connection with poller");
                    continue;
                }

                let conn = Connection::new(
                    stream,
                    addr,
                    buffer_pool.clone(),
                    live_count.clone(),
                    decoder.clone(),
                    encoder.clone(),
                    timer_factory.as_ref().map(TimerFactory::handle),
                );
                registry.insert(conn.clone());
                handler.on_connect(&conn);

                if conn.take_close_requested() {
                    conn.close(&producer_registry);
                    handler.on_close(&conn, CloseReason::Requested);
                    registry.remove(fd);
                    continue;
                }
                trace!(fd, remote = %addr, "accepted connection");
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => continue,
            Err(e) => warn!(error = %e, thread_id, "accept failed"),
        }
    }
}
