use std::{
    cmp::Ordering as CmpOrdering,
    collections::BinaryHeap,
    os::unix::io::RawFd,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, Ordering},
        mpsc::{Receiver, RecvTimeoutError, Sender},
    },
    time::{Duration, Instant},
};

use crate::{
    netpoll::{EventKind, PollEvent},
    shard::{ShardSender, WorkerMessage, shard_for},
};

/// One arm (or re-arm) of a connection's idle timer: fire `Timeout` at
/// `deadline` unless `current_generation` has moved past `generation` by
/// then, meaning the connection was touched again since this was queued.
pub(crate) struct Entry {
    deadline: Instant,
    fd: RawFd,
    generation: u64,
    current_generation: Arc<AtomicU64>,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline
    }
}
impl Eq for Entry {}
impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}
impl Ord for Entry {
    // Reversed so a max-heap (`BinaryHeap`'s only mode) pops the earliest
    // deadline first.
    fn cmp(&self, other: &Self) -> CmpOrdering {
        other.deadline.cmp(&self.deadline)
    }
}

/// A connection's one-shot idle timer. Rearming doesn't remove the previous
/// entry from the scheduler's heap; it just bumps `generation`, so the old
/// entry is recognized as stale and discarded when it eventually surfaces.
pub(crate) struct TimerHandle {
    tx: Sender<Entry>,
    idle_timeout: Duration,
    generation: Arc<AtomicU64>,
}

impl TimerHandle {
    pub(crate) fn new(tx: Sender<Entry>, idle_timeout: Duration) -> Self {
        Self { tx, idle_timeout, generation: Arc::new(AtomicU64::new(0)) }
    }

    /// Arms or re-arms the timer for `fd`, due `idle_timeout` from now.
    pub(crate) fn arm(&self, fd: RawFd) {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        let entry = Entry {
            deadline: Instant::now() + self.idle_timeout,
            fd,
            generation,
            current_generation: self.generation.clone(),
        };
        let _ = self.tx.send(entry);
    }
}

/// Shared by every accept thread so each accepted connection gets its own
/// [`TimerHandle`] (and thus its own independent generation counter) without
/// each accept thread needing to know about the supervisor's channel.
#[derive(Clone)]
pub(crate) struct TimerFactory {
    tx: Sender<Entry>,
    idle_timeout: Duration,
}

impl TimerFactory {
    pub(crate) fn new(tx: Sender<Entry>, idle_timeout: Duration) -> Self {
        Self { tx, idle_timeout }
    }

    pub(crate) fn handle(&self) -> TimerHandle {
        TimerHandle::new(self.tx.clone(), self.idle_timeout)
    }
}

/// The timer supervisor: one thread owning a deadline-ordered heap of armed
/// timers, playing the role the original's per-connection `time.AfterFunc`
/// timer plays, without actually spawning one OS/runtime timer per
/// connection. A connection's timer is "armed" by sending an `Entry`; the
/// supervisor fires a `Timeout` event through the normal shard queues for
/// any entry whose deadline has passed and whose generation is still
/// current, exactly as if that connection's own timer object had expired.
pub(crate) fn run(rx: Receiver<Entry>, senders: Vec<ShardSender>, io_gnum: usize, stop: Arc<AtomicBool>) {
    let mut heap: BinaryHeap<Entry> = BinaryHeap::new();
    const POLL_SLICE: Duration = Duration::from_millis(200);

    loop {
        if stop.load(Ordering::Relaxed) {
            break;
        }

        let now = Instant::now();
        while let Some(top) = heap.peek() {
            if top.deadline > now {
                break;
            }
            let entry = heap.pop().expect("just peeked");
            if entry.current_generation.load(Ordering::Relaxed) == entry.generation {
                let shard = shard_for(entry.fd, io_gnum);
                let _ =
                    senders[shard].send(WorkerMessage::Event(PollEvent { fd: entry.fd, kind: EventKind::Timeout }));
            }
        }

        let wait = heap
            .peek()
            .map(|e| e.deadline.saturating_duration_since(Instant::now()))
            .unwrap_or(POLL_SLICE)
            .min(POLL_SLICE);

        match rx.recv_timeout(wait) {
            Ok(entry) => heap.push(entry),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
}
