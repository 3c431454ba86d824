use std::io;

use reactor_codec::DecodeError;
use thiserror::Error;

/// Fatal construction-time failures: nothing has been spawned yet.
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("binding {addr}: {source}")]
    Bind { addr: String, #[source] source: io::Error },

    #[error("constructing event poller: {0}")]
    Poll(#[source] io::Error),

    #[error("server configuration invalid: {0}")]
    Config(String),
}

/// Why a connection was torn down. Delivered to [`crate::Handler::on_close`]
/// exactly once per connection that reached `on_connect`.
#[derive(Error, Debug)]
pub enum CloseReason {
    #[error("remote peer performed an orderly shutdown")]
    Eof,
    #[error("remote peer reset the connection")]
    RemoteReset,
    #[error("connection exceeded its idle timeout")]
    ReadTimeout,
    #[error("frame violated codec length invariant: {0}")]
    IllegalLength(#[source] DecodeError),
    #[error("application requested this connection be closed")]
    Requested,
    #[error("I/O error: {0}")]
    Io(#[source] io::Error),
}

/// Internal: what `Connection::read` can fail with before it is mapped to a
/// [`CloseReason`] by the worker loop.
#[derive(Error, Debug)]
pub(crate) enum ReadFailure {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Io(#[from] io::Error),
}
