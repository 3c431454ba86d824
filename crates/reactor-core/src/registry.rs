use std::{os::unix::io::RawFd, sync::Arc};

use dashmap::DashMap;

use crate::connection::Connection;

/// Every live connection, keyed by fd. The single source of truth for
/// "is this connection still open"; workers and the timeout supervisor
/// both consult it, and removing an entry is what triggers teardown (see
/// `Connection`'s `Drop`).
pub struct Registry<D> {
    conns: DashMap<RawFd, Arc<Connection<D>>>,
}

impl<D> Registry<D> {
    pub fn new() -> Self {
        Self { conns: DashMap::new() }
    }

    pub fn insert(&self, conn: Arc<Connection<D>>) {
        self.conns.insert(conn.fd(), conn);
    }

    /// Look up a connection without holding a shard guard across the call.
    /// `DashMap` deadlocks if a read guard on a shard is still alive when
    /// `remove` is called for a key in the same shard, so callers must let
    /// the closure's return value outlive the lookup, not the guard itself.
    pub fn with<R>(&self, fd: RawFd, f: impl FnOnce(&Arc<Connection<D>>) -> R) -> Option<R> {
        self.conns.get(&fd).map(|entry| f(entry.value()))
    }

    /// Drops the registry's `Arc`, which, since nothing else ever clones it,
    /// runs `Connection::drop` synchronously on the calling thread.
    pub fn remove(&self, fd: RawFd) {
        self.conns.remove(&fd);
    }

    pub fn len(&self) -> usize {
        self.conns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conns.is_empty()
    }

    pub fn for_each(&self, mut f: impl FnMut(RawFd, &Arc<Connection<D>>)) {
        for entry in self.conns.iter() {
            f(*entry.key(), entry.value());
        }
    }
}

impl<D> Default for Registry<D> {
    fn default() -> Self {
        Self::new()
    }
}
