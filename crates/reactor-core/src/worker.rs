use std::{io, os::unix::io::RawFd, sync::Arc};

use mio::Registry as MioRegistry;
use tracing::trace;

use crate::{
    error::{CloseReason, ReadFailure},
    handler::Handler,
    netpoll::EventKind,
    registry::Registry,
    shard::{ShardReceiver, WorkerMessage},
};

/// Body of one I/O worker thread. Owns one shard's queue exclusively, so
/// every event for a given fd, including the `Timeout`/`RemoteClose`
/// events that tear it down, is always processed by this same thread,
/// in order, with no cross-connection locking required.
pub(crate) fn run<D, H: Handler<D>>(
    receiver: ShardReceiver,
    registry: Arc<Registry<D>>,
    handler: Arc<H>,
    poll_registry: MioRegistry,
) {
    while let Ok(msg) = receiver.recv() {
        let event = match msg {
            WorkerMessage::Shutdown => break,
            WorkerMessage::Event(event) => event,
        };

        match event.kind {
            EventKind::Incoming => handle_incoming(event.fd, &registry, handler.as_ref(), &poll_registry),
            EventKind::RemoteClose => teardown(event.fd, CloseReason::Eof, &registry, handler.as_ref(), &poll_registry),
            EventKind::Timeout => {
                teardown(event.fd, CloseReason::ReadTimeout, &registry, handler.as_ref(), &poll_registry)
            }
        }
    }
}

fn handle_incoming<D, H: Handler<D>>(
    fd: RawFd,
    registry: &Registry<D>,
    handler: &H,
    poll_registry: &MioRegistry,
) {
    let outcome = registry.with(fd, |conn| conn.read(handler));
    let Some(outcome) = outcome else {
        // The connection was already torn down by a RemoteClose/Timeout
        // event that beat this Incoming event through the same queue.
        return;
    };

    match outcome {
        Ok(()) => {
            let wants_close = registry.with(fd, |conn| conn.take_close_requested());
            if wants_close == Some(true) {
                teardown(fd, CloseReason::Requested, registry, handler, poll_registry);
            }
        }
        Err(ReadFailure::Io(e)) if e.raw_os_error() == Some(libc::EBADF) => {
            trace!(fd, "read against an fd already closed by this worker; benign race");
        }
        Err(ReadFailure::Io(e)) if e.kind() == io::ErrorKind::ConnectionReset => {
            teardown(fd, CloseReason::RemoteReset, registry, handler, poll_registry);
        }
        Err(ReadFailure::Io(e)) => teardown(fd, CloseReason::Io(e), registry, handler, poll_registry),
        Err(ReadFailure::Decode(e)) => {
            teardown(fd, CloseReason::IllegalLength(e), registry, handler, poll_registry)
        }
    }
}

fn teardown<D, H: Handler<D>>(
    fd: RawFd,
    reason: CloseReason,
    registry: &Registry<D>,
    handler: &H,
    poll_registry: &MioRegistry,
) {
    let torn_down = registry.with(fd, |conn| {
        conn.close(poll_registry);
        handler.on_close(conn, reason);
    });
    // Remove after the `with` guard is dropped: DashMap deadlocks if a shard
    // read guard is still held when `remove` targets the same shard.
    if torn_down.is_some() {
        registry.remove(fd);
    }
}
