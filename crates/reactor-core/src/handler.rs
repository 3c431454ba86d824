use crate::{connection::Connection, error::CloseReason};

/// Application callback interface. One `Handler` is shared (via `Arc`)
/// across every accept and I/O worker thread, so implementations must be
/// `Send + Sync`; a typical implementation holds no mutable state of its own
/// and instead reaches into the per-connection `user_data` slot or an
/// external store it owns.
///
/// `conn` borrows the connection for the duration of the call only; it
/// cannot be retained past the callback returning. Writes, including ones
/// triggered by `on_message`, must happen synchronously within these calls.
pub trait Handler<D>: Send + Sync + 'static {
    /// Called once, from an accept thread, right after the connection is
    /// registered and before any `on_message` call for it can be dispatched.
    fn on_connect(&self, conn: &Connection<D>) {
        let _ = conn;
    }

    /// Called once per decoded frame (or once per non-blocking read when no
    /// decoder is configured, with the raw bytes read).
    fn on_message(&self, conn: &Connection<D>, bytes: &[u8]);

    /// Called exactly once per connection that reached `on_connect`, from
    /// whichever worker shard owns that connection's fd.
    fn on_close(&self, conn: &Connection<D>, reason: CloseReason) {
        let (_, _) = (conn, reason);
    }
}
