//! Length-prefixed framing over a per-connection compacting read buffer.
//!
//! This crate has no networking dependency: [`Buffer`] reads from anything
//! implementing [`std::io::Read`], and [`Decoder`]/[`Encoder`] operate purely
//! on bytes. `reactor-core` wires these to real sockets.

mod buffer;
mod decoder;
mod encoder;
pub mod error;
mod pool;

pub use buffer::{Buffer, ReadOutcome};
pub use decoder::{Decoder, FixedHeaderDecoder, UvarintDecoder};
pub use encoder::{Encoder, FixedHeaderEncoder, UvarintEncoder};
pub use error::{BufferError, DecodeError};

#[cfg(test)]
mod framing_property_tests {
    use std::io::Cursor;

    use rand::{Rng, SeedableRng, rngs::StdRng};

    use crate::{Buffer, Decoder, Encoder, FixedHeaderDecoder, FixedHeaderEncoder, UvarintDecoder, UvarintEncoder};

    fn roundtrip_through_chunks(encoded: &[u8], chunk_sizes: &[usize], decoder: &dyn Decoder) -> Vec<Vec<u8>> {
        let mut buffer = Buffer::new(4096);
        let mut received = Vec::new();
        let mut offset = 0;

        for &chunk in chunk_sizes {
            let end = (offset + chunk).min(encoded.len());
            let mut cursor = Cursor::new(encoded[offset..end].to_vec());
            while cursor.position() < (end - offset) as u64 {
                buffer.read_from(&mut cursor).unwrap();
            }
            decoder.decode(&mut buffer, &mut |b| received.push(b.to_vec())).unwrap();
            offset = end;
            if offset >= encoded.len() {
                break;
            }
        }
        received
    }

    #[test]
    fn fixed_header_roundtrip_under_arbitrary_chunking() {
        let encoder = FixedHeaderEncoder::default();
        let decoder = FixedHeaderDecoder::default();
        let messages: Vec<Vec<u8>> =
            vec![b"a".to_vec(), b"BC".to_vec(), b"hello world".to_vec(), Vec::new()];

        let mut wire = Vec::new();
        for m in &messages {
            encoder.encode_to_writer(&mut wire, m).unwrap();
        }

        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let mut chunks = Vec::new();
            let mut remaining = wire.len();
            while remaining > 0 {
                let take = rng.random_range(1..=remaining.min(5));
                chunks.push(take);
                remaining -= take;
            }
            let got = roundtrip_through_chunks(&wire, &chunks, &decoder);
            assert_eq!(got, messages);
        }
    }

    #[test]
    fn uvarint_roundtrip_under_arbitrary_chunking() {
        let encoder = UvarintEncoder::new(256);
        let decoder = UvarintDecoder;
        let messages: Vec<Vec<u8>> = vec![vec![0u8; 200], b"x".to_vec(), b"two".to_vec()];

        let mut wire = Vec::new();
        for m in &messages {
            encoder.encode_to_writer(&mut wire, m).unwrap();
        }

        let got = roundtrip_through_chunks(&wire, &[3, 7, 1, wire.len()], &decoder);
        assert_eq!(got, messages);
    }

    #[test]
    fn illegal_length_is_rejected_without_delivering_frame() {
        let decoder = FixedHeaderDecoder::default();
        let mut buffer = Buffer::new(10);
        // header_len=2, declared body_len=0xFF exceeds cap(10) - header_len(2) = 8.
        let mut cursor = Cursor::new(vec![0x00, 0xFF]);
        buffer.read_from(&mut cursor).unwrap();

        let mut delivered = false;
        let err = decoder.decode(&mut buffer, &mut |_| delivered = true);
        assert!(err.is_err());
        assert!(!delivered);
    }
}
