use std::{
    os::unix::io::RawFd,
    sync::mpsc::{Receiver, SyncSender},
};

use crate::netpoll::PollEvent;

/// What travels down a worker's queue. `Shutdown` is a sentinel rather than
/// relying on channel disconnection, since the event producer, the timer
/// supervisor, and the timeout backstop all independently hold a `Sender`
/// for a given shard. An explicit message keeps the "drain, then exit"
/// contract simple to reason about regardless of how many senders exist.
pub(crate) enum WorkerMessage {
    Event(PollEvent),
    Shutdown,
}

pub(crate) type ShardSender = SyncSender<WorkerMessage>;
pub(crate) type ShardReceiver = Receiver<WorkerMessage>;

/// Routes an fd to its owning worker shard. This is the crate's central
/// correctness property: every event for a given connection always lands on
/// the same shard, so a single connection's events are processed in order
/// by a single thread without any per-connection lock.
pub(crate) fn shard_for(fd: RawFd, io_gnum: usize) -> usize {
    (fd as usize) % io_gnum
}
