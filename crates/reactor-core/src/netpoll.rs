use std::{io, os::unix::io::RawFd, time::Duration};

use mio::{Events, Interest, Poll, Registry, Token, net::TcpListener as MioTcpListener};

/// What a producer-loop wakeup meant for one fd.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// The socket is readable; a worker should drain it.
    Incoming,
    /// The peer half-closed its write side (`EPOLLRDHUP`/`EV_EOF`
    /// equivalent, surfaced portably by `mio::event::Event::is_read_closed`).
    RemoteClose,
    /// Synthesized by the per-connection timer or the registry-sweep
    /// backstop, not by the poller.
    Timeout,
}

#[derive(Debug, Clone, Copy)]
pub struct PollEvent {
    pub fd: RawFd,
    pub kind: EventKind,
}

/// How many readiness events `poll` surfaces per wakeup. Independent of
/// shard queue capacity, which is a separate knob (`io_event_queue_len`).
const EVENT_BATCH_CAPACITY: usize = 100;

/// Owns the single `mio::Poll` that the event producer blocks on. Every
/// accepted connection is registered here, keyed by `Token(fd as usize)`.
/// The token is the fd, so no separate token table is needed to recover
/// which connection an event belongs to.
pub struct Netpoll {
    poll: Poll,
    events: Events,
}

impl Netpoll {
    pub fn new() -> io::Result<Self> {
        Ok(Self { poll: Poll::new()?, events: Events::with_capacity(EVENT_BATCH_CAPACITY) })
    }

    /// A cheap, independently-usable handle for registering/deregistering
    /// sources from other threads (accept threads register new connections
    /// here; workers deregister closed ones).
    pub fn registry(&self) -> io::Result<Registry> {
        self.poll.registry().try_clone()
    }

    /// Block up to `timeout` for readiness, translating whatever fired into
    /// our [`PollEvent`]s. A bounded timeout (rather than `None`) lets the
    /// producer thread notice a shutdown request between polls.
    pub fn poll(&mut self, timeout: Duration, out: &mut Vec<PollEvent>) -> io::Result<()> {
        out.clear();
        match self.poll.poll(&mut self.events, Some(timeout)) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::Interrupted => return Ok(()),
            Err(e) => return Err(e),
        }
        for event in self.events.iter() {
            let fd = event.token().0 as RawFd;
            if event.is_read_closed() || event.is_error() {
                out.push(PollEvent { fd, kind: EventKind::RemoteClose });
            } else if event.is_readable() {
                out.push(PollEvent { fd, kind: EventKind::Incoming });
            }
        }
        Ok(())
    }
}

/// Registers a freshly-accepted stream with the producer's poller for
/// read-readiness. Must happen before the fd is handed to any worker.
pub fn register_stream(
    registry: &Registry,
    stream: &mut mio::net::TcpStream,
    fd: RawFd,
) -> io::Result<()> {
    registry.register(stream, Token(fd as usize), Interest::READABLE)
}

/// One per accept thread: a private `Poll` watching a `dup`'d handle to the
/// shared listening socket, so every accept thread can block independently
/// instead of racing on a single poller.
pub struct AcceptPoll {
    poll: Poll,
    events: Events,
    listener: MioTcpListener,
}

impl AcceptPoll {
    pub fn new(std_listener: &std::net::TcpListener) -> io::Result<Self> {
        let cloned = std_listener.try_clone()?;
        let mut listener = MioTcpListener::from_std(cloned);
        let poll = Poll::new()?;
        poll.registry().register(&mut listener, Token(0), Interest::READABLE)?;
        Ok(Self { poll, events: Events::with_capacity(16), listener })
    }

    /// Blocks (in bounded slices of `poll_timeout`) until a connection is
    /// ready to accept, then accepts exactly one. Returns `WouldBlock` if
    /// `poll_timeout` elapsed with nothing ready, so callers can check a
    /// shutdown flag between attempts.
    pub fn accept(
        &mut self,
        poll_timeout: Duration,
    ) -> io::Result<(mio::net::TcpStream, std::net::SocketAddr)> {
        loop {
            match self.listener.accept() {
                Ok((stream, addr)) => return Ok((stream, addr)),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    self.poll.poll(&mut self.events, Some(poll_timeout))?;
                    if self.events.iter().next().is_none() {
                        return Err(io::Error::from(io::ErrorKind::WouldBlock));
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }
}
