//! A sharded, readiness-based TCP reactor: one accept-thread pool feeding a
//! shared epoll/kqueue instance, a single event producer fanning readiness
//! out to `fd % N` worker shards, and a per-connection idle timer (backed by
//! a registry-sweep backstop) reaping connections that go quiet. All of it
//! is generic over an application [`Handler`] and an opaque per-connection
//! `user_data` slot.
//!
//! Linux and BSD/macOS only: the reactor is built directly on `mio`'s
//! epoll/kqueue backends and on raw fds, so it does not run on Windows.

mod accept;
mod buffer_pool;
mod config;
mod connection;
mod error;
mod handler;
mod netpoll;
mod producer;
mod registry;
mod server;
mod shard;
mod timeout;
mod timer;
mod worker;

pub use config::ServerConfig;
pub use connection::Connection;
pub use error::{CloseReason, ServerError};
pub use handler::Handler;
pub use server::Server;

pub use reactor_codec::{Decoder, Encoder, FixedHeaderDecoder, FixedHeaderEncoder, UvarintDecoder, UvarintEncoder};
