use std::time::Duration;

use reactor_codec::{Decoder, Encoder};

/// Builder for [`crate::Server`]. Mirrors the functional-options shape of the
/// implementation this crate generalizes: every knob has a sane default sized
/// off the host, and construction panics on nonsensical values rather than
/// silently clamping them. A bad config is a programmer error, not a
/// runtime condition to recover from.
pub struct ServerConfig {
    pub(crate) read_buffer_len: usize,
    pub(crate) accept_gnum: usize,
    pub(crate) io_gnum: usize,
    pub(crate) io_event_queue_len: usize,
    pub(crate) idle_timeout: Option<Duration>,
    pub(crate) timeout_ticker: Option<Duration>,
    pub(crate) decoder: Option<Box<dyn Decoder>>,
    pub(crate) encoder: Option<Box<dyn Encoder>>,
}

impl ServerConfig {
    pub fn new() -> Self {
        let cores = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
        Self {
            read_buffer_len: 1024,
            accept_gnum: cores,
            io_gnum: cores,
            io_event_queue_len: 1024,
            idle_timeout: None,
            timeout_ticker: None,
            decoder: None,
            encoder: None,
        }
    }

    /// Capacity of each connection's compacting read buffer, and thus the
    /// largest frame body the default codecs will accept.
    pub fn read_buffer_len(mut self, n: usize) -> Self {
        assert!(n > 0, "read_buffer_len must be positive");
        self.read_buffer_len = n;
        self
    }

    /// Number of threads calling `accept(2)` on the shared listener.
    pub fn accept_gnum(mut self, n: usize) -> Self {
        assert!(n > 0, "accept_gnum must be positive");
        self.accept_gnum = n;
        self
    }

    /// Number of worker shards (and bound on concurrent `fd % N` queues).
    pub fn io_gnum(mut self, n: usize) -> Self {
        assert!(n > 0, "io_gnum must be positive");
        self.io_gnum = n;
        self
    }

    /// Bound on each shard's pending-event queue before a producer send
    /// blocks (backpressure into the single-threaded event producer).
    pub fn io_event_queue_len(mut self, n: usize) -> Self {
        assert!(n > 0, "io_event_queue_len must be positive");
        self.io_event_queue_len = n;
        self
    }

    /// A connection idle (no bytes read) for longer than `d` is closed with
    /// [`crate::CloseReason::ReadTimeout`]. `None` (the default) disables
    /// idle reaping entirely.
    pub fn idle_timeout(mut self, d: Duration) -> Self {
        assert!(!d.is_zero(), "idle_timeout must be positive; omit the call to disable it");
        self.idle_timeout = Some(d);
        self
    }

    /// How often the timeout supervisor sweeps the registry for idle
    /// connections. Defaults to `max(idle_timeout / 4, 100ms)` when an idle
    /// timeout is set; irrelevant otherwise.
    pub fn timeout_ticker(mut self, d: Duration) -> Self {
        assert!(!d.is_zero(), "timeout_ticker must be positive");
        self.timeout_ticker = Some(d);
        self
    }

    pub fn decoder(mut self, decoder: impl Decoder + 'static) -> Self {
        self.decoder = Some(Box::new(decoder));
        self
    }

    pub fn encoder(mut self, encoder: impl Encoder + 'static) -> Self {
        self.encoder = Some(Box::new(encoder));
        self
    }

    pub(crate) fn resolved_ticker(&self) -> Duration {
        if let Some(explicit) = self.timeout_ticker {
            return explicit;
        }
        match self.idle_timeout {
            Some(t) => (t / 4).max(Duration::from_millis(100)),
            None => Duration::from_secs(1),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new()
    }
}
