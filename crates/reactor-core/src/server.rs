use std::{
    net::{SocketAddr, TcpListener as StdTcpListener},
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicI64, Ordering},
    },
    sync::mpsc::sync_channel,
    thread::{self, JoinHandle},
};

use reactor_codec::{Decoder, Encoder};
use tracing::info;

use crate::{
    accept, buffer_pool::BufferPool, config::ServerConfig, error::ServerError, handler::Handler,
    netpoll::Netpoll, producer, registry::Registry, shard::ShardSender, timeout,
    timer::{self, TimerFactory},
};

/// A running (or not-yet-running) reactor bound to one listening socket.
///
/// `bind` performs the (fallible) setup: binding the socket, constructing
/// the shared poller, and sizing the worker shards. `run` then spawns every
/// thread and returns immediately. The server runs in the background until
/// `stop` is called or the process exits.
pub struct Server<H, D> {
    listener: Arc<StdTcpListener>,
    local_addr: SocketAddr,
    config: ServerConfig,
    registry: Arc<Registry<D>>,
    buffer_pool: Arc<BufferPool>,
    live_count: Arc<AtomicI64>,
    handler: Arc<H>,
    stop: Arc<AtomicBool>,
    threads: Vec<JoinHandle<()>>,
}

impl<H: Handler<D>, D: Send + Sync + 'static> Server<H, D> {
    pub fn bind(addr: SocketAddr, config: ServerConfig, handler: H) -> Result<Self, ServerError> {
        let listener = StdTcpListener::bind(addr)
            .map_err(|source| ServerError::Bind { addr: addr.to_string(), source })?;
        listener.set_nonblocking(true).map_err(ServerError::Poll)?;
        let local_addr = listener.local_addr().map_err(ServerError::Poll)?;

        Ok(Self {
            listener: Arc::new(listener),
            local_addr,
            config,
            registry: Arc::new(Registry::new()),
            buffer_pool: Arc::new(BufferPool::new(0)), // sized in `run`, once read_buffer_len is final
            live_count: Arc::new(AtomicI64::new(0)),
            handler: Arc::new(handler),
            stop: Arc::new(AtomicBool::new(false)),
            threads: Vec::new(),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn live_connections(&self) -> i64 {
        self.live_count.load(Ordering::Relaxed)
    }

    /// Spawns the accept pool, the event producer, the I/O worker pool, and,
    /// if an idle timeout is configured, both the per-connection timer
    /// supervisor and its registry-sweep backstop. Returns once every thread
    /// is spawned; all threads share `self`'s `Arc`-wrapped state.
    pub fn run(&mut self) -> Result<(), ServerError> {
        self.buffer_pool = Arc::new(BufferPool::new(self.config.read_buffer_len));

        let netpoll = Netpoll::new().map_err(ServerError::Poll)?;
        let producer_registry = netpoll.registry().map_err(ServerError::Poll)?;

        let mut senders: Vec<ShardSender> = Vec::with_capacity(self.config.io_gnum);
        let mut receivers = Vec::with_capacity(self.config.io_gnum);
        for _ in 0..self.config.io_gnum {
            let (tx, rx) = sync_channel(self.config.io_event_queue_len);
            senders.push(tx);
            receivers.push(rx);
        }

        // ServerConfig owns `Box<dyn ..>`; threads need a cloneable shared
        // handle, so move each into an `Arc` exactly once here.
        let decoder: Option<Arc<dyn Decoder>> = self.config.decoder.take().map(Arc::from);
        let encoder: Option<Arc<dyn Encoder>> = self.config.encoder.take().map(Arc::from);

        // The per-connection timer (primary idle-timeout mechanism) and the
        // registry-sweep backstop are both only relevant when a timeout is
        // configured at all.
        let mut timer_factory: Option<TimerFactory> = None;
        if let Some(idle_timeout) = self.config.idle_timeout {
            let (tx, rx) = std::sync::mpsc::channel();
            let io_gnum = self.config.io_gnum;
            let stop = self.stop.clone();
            let timer_senders = senders.clone();
            self.threads.push(
                thread::Builder::new()
                    .name("reactor-timer".to_string())
                    .spawn(move || timer::run(rx, timer_senders, io_gnum, stop))
                    .map_err(ServerError::Poll)?,
            );
            timer_factory = Some(TimerFactory::new(tx, idle_timeout));
        }

        for id in 0..self.config.accept_gnum {
            let listener = self.listener.clone();
            let producer_registry = producer_registry.try_clone().map_err(ServerError::Poll)?;
            let registry = self.registry.clone();
            let buffer_pool = self.buffer_pool.clone();
            let live_count = self.live_count.clone();
            let decoder = decoder.clone();
            let encoder = encoder.clone();
            let timer_factory = timer_factory.clone();
            let handler = self.handler.clone();
            let stop = self.stop.clone();
            self.threads.push(thread::Builder::new().name(format!("reactor-accept-{id}")).spawn(move || {
                accept::run(
                    id, listener, producer_registry, registry, buffer_pool, live_count, decoder, encoder,
                    timer_factory, handler, stop,
                )
            }).map_err(ServerError::Poll)?);
        }

        if let Some(idle_timeout) = self.config.idle_timeout {
            let registry = self.registry.clone();
            let senders = senders.clone();
            let io_gnum = self.config.io_gnum;
            let tick = self.config.resolved_ticker();
            let stop = self.stop.clone();
            self.threads.push(
                thread::Builder::new()
                    .name("reactor-timeout".to_string())
                    .spawn(move || timeout::run(registry, senders, io_gnum, idle_timeout, tick, stop))
                    .map_err(ServerError::Poll)?,
            );
        }

        for (id, rx) in receivers.into_iter().enumerate() {
            let registry = self.registry.clone();
            let handler = self.handler.clone();
            let poll_registry = producer_registry.try_clone().map_err(ServerError::Poll)?;
            self.threads.push(
                thread::Builder::new()
                    .name(format!("reactor-worker-{id}"))
                    .spawn(move || crate::worker::run(rx, registry, handler, poll_registry))
                    .map_err(ServerError::Poll)?,
            );
        }

        let io_gnum = self.config.io_gnum;
        let stop = self.stop.clone();
        self.threads.push(
            thread::Builder::new()
                .name("reactor-producer".to_string())
                .spawn(move || producer::run(netpoll, senders, io_gnum, stop))
                .map_err(ServerError::Poll)?,
        );

        info!(addr = %self.local_addr, accept_gnum = self.config.accept_gnum, io_gnum = self.config.io_gnum, "reactor started");
        Ok(())
    }

    /// Signals every thread to stop and joins them. Connections that are
    /// still open when `stop` is called are left as-is. This tears down
    /// the reactor's threads, not the sockets it's holding open; a caller
    /// that wants a clean drain should stop accepting first and wait for
    /// `live_connections()` to settle before calling this.
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        for handle in self.threads.drain(..) {
            let _ = handle.join();
        }
    }
}
