use thiserror::Error;

/// Returned by [`crate::Buffer::seek`]/[`crate::Buffer::read`] when the
/// buffer does not yet hold enough bytes. Not an error from the decoder's
/// point of view; it means "come back after the next read".
#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
pub enum BufferError {
    #[error("not enough bytes buffered")]
    NotEnough,
}

/// Fatal, per-connection framing error.
#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("frame declared body length {body_len} exceeds buffer capacity {cap} - {header_len}")]
    IllegalLength { body_len: u64, header_len: usize, cap: usize },
}
