use std::io::{self, Write};

use crate::{
    decoder::{encode_uvarint, uvarint_len},
    pool::SmallBufPool,
};

/// Frames a payload for the wire and writes it out.
///
/// `encode_to_writer` is the only required entry point; `encode` (producing
/// a standalone `Vec<u8>`) is provided for callers that want the framed
/// bytes without an immediate write (e.g. tests).
pub trait Encoder: Send + Sync {
    fn encode_to_writer(&self, writer: &mut dyn Write, body: &[u8]) -> io::Result<()>;

    fn encode(&self, body: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        self.encode_to_writer(&mut out, body).expect("writing to a Vec cannot fail");
        out
    }
}

/// Big-endian fixed-width length header. Small frames (`body.len() +
/// header_len <= suggested`) are staged in a pooled buffer to avoid an
/// allocation per write; larger frames allocate directly.
pub struct FixedHeaderEncoder {
    header_len: usize,
    pool: SmallBufPool,
}

impl FixedHeaderEncoder {
    pub fn new(header_len: usize, suggested_len: usize) -> Self {
        assert!(
            matches!(header_len, 1 | 2 | 4 | 8),
            "fixed header length must be 1, 2, 4, or 8 bytes"
        );
        Self { header_len, pool: SmallBufPool::new(suggested_len) }
    }

    fn write_len(&self, out: &mut [u8], len: u64) {
        match self.header_len {
            1 => out[0] = len as u8,
            2 => out[..2].copy_from_slice(&(len as u16).to_be_bytes()),
            4 => out[..4].copy_from_slice(&(len as u32).to_be_bytes()),
            8 => out[..8].copy_from_slice(&len.to_be_bytes()),
            _ => unreachable!("validated in new()"),
        }
    }
}

impl Default for FixedHeaderEncoder {
    fn default() -> Self {
        Self::new(2, 1024)
    }
}

impl Encoder for FixedHeaderEncoder {
    fn encode_to_writer(&self, writer: &mut dyn Write, body: &[u8]) -> io::Result<()> {
        let total = self.header_len + body.len();
        let mut staged = self.pool.acquire(total);
        staged.resize(total, 0);
        self.write_len(&mut staged[..self.header_len], body.len() as u64);
        staged[self.header_len..].copy_from_slice(body);
        let result = writer.write_all(&staged);
        self.pool.release(staged);
        result
    }
}

/// LEB128 uvarint length header.
pub struct UvarintEncoder {
    pool: SmallBufPool,
}

impl UvarintEncoder {
    pub fn new(suggested_len: usize) -> Self {
        Self { pool: SmallBufPool::new(suggested_len) }
    }
}

impl Encoder for UvarintEncoder {
    fn encode_to_writer(&self, writer: &mut dyn Write, body: &[u8]) -> io::Result<()> {
        let header_len = uvarint_len(body.len() as u64);
        let total = header_len + body.len();
        let mut staged = self.pool.acquire(total);
        staged.resize(total, 0);
        encode_uvarint(body.len() as u64, &mut staged[..header_len]);
        staged[header_len..].copy_from_slice(body);
        let result = writer.write_all(&staged);
        self.pool.release(staged);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Buffer, decoder::FixedHeaderDecoder, Decoder};

    #[test]
    fn fixed_header_encode_decode_roundtrip() {
        let encoder = FixedHeaderEncoder::default();
        let decoder = FixedHeaderDecoder::default();

        let mut wire = Vec::new();
        encoder.encode_to_writer(&mut wire, b"hello").unwrap();
        assert_eq!(wire, vec![0, 5, b'h', b'e', b'l', b'l', b'o']);

        let mut buffer = Buffer::new(64);
        let mut cursor = std::io::Cursor::new(wire);
        buffer.read_from(&mut cursor).unwrap();

        let mut received = Vec::new();
        decoder.decode(&mut buffer, &mut |b| received.push(b.to_vec())).unwrap();
        assert_eq!(received, vec![b"hello".to_vec()]);
    }
}
