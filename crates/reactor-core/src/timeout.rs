use std::{
    sync::{Arc, atomic::{AtomicBool, Ordering}},
    thread,
    time::Duration,
};

use crate::{
    netpoll::{EventKind, PollEvent},
    registry::Registry,
    shard::{WorkerMessage, shard_for, ShardSender},
};

/// Backstop for the per-connection timer in `timer.rs`. The per-connection
/// timer is the primary mechanism; this ticker thread exists for the case
/// where an arm/re-arm message never reached the timer supervisor (e.g. its
/// channel is momentarily saturated under load) and so a connection's own
/// timer silently failed to fire. It sweeps the registry on a fixed
/// cadence, using the same `last_active` timestamp the per-connection timer
/// is seeded from, and synthesizes a `Timeout` event for anything the
/// primary mechanism missed. Closing still goes through the normal worker
/// event path so a connection is only ever destroyed from the shard thread
/// that owns it.
pub(crate) fn run<D>(
    registry: Arc<Registry<D>>,
    senders: Vec<ShardSender>,
    io_gnum: usize,
    idle_timeout: Duration,
    tick: Duration,
    stop: Arc<AtomicBool>,
) {
    let mut expired = Vec::new();
    while !stop.load(Ordering::Relaxed) {
        thread::sleep(tick);
        if stop.load(Ordering::Relaxed) {
            break;
        }

        expired.clear();
        registry.for_each(|fd, conn| {
            if conn.idle_for() >= idle_timeout {
                expired.push(fd);
            }
        });

        for fd in expired.drain(..) {
            let shard = shard_for(fd, io_gnum);
            let _ = senders[shard].send(WorkerMessage::Event(PollEvent { fd, kind: EventKind::Timeout }));
        }
    }
}
