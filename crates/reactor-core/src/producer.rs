use std::{
    sync::{Arc, atomic::{AtomicBool, Ordering}},
    time::Duration,
};

use tracing::warn;

use crate::{
    netpoll::Netpoll,
    shard::{WorkerMessage, shard_for, ShardSender},
};

/// The single event producer thread: owns the shared `mio::Poll`, fans
/// readiness events out to worker shards by `fd % io_gnum`, and on shutdown
/// sends every shard a `Shutdown` sentinel so workers can drain and exit.
pub(crate) fn run(mut netpoll: Netpoll, senders: Vec<ShardSender>, io_gnum: usize, stop: Arc<AtomicBool>) {
    let mut events = Vec::with_capacity(128);
    while !stop.load(Ordering::Relaxed) {
        if let Err(e) = netpoll.poll(Duration::from_millis(200), &mut events) {
            warn!(error = %e, "event producer poll failed");
            continue;
        }
        for ev in &events {
            let shard = shard_for(ev.fd, io_gnum);
            // A full shard queue means that worker is falling behind; block
            // rather than drop, so the sharding invariant (fd always maps
            // to the same worker) never has to make an exception for load.
            if senders[shard].send(WorkerMessage::Event(*ev)).is_err() {
                warn!(fd = ev.fd, shard, "worker shard gone, dropping event");
            }
        }
    }
    for sender in &senders {
        let _ = sender.try_send(WorkerMessage::Shutdown);
    }
}
