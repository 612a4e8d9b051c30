//! Text form of a nonce list: each nonce encoded on its own, joined by commas.
use crate::error::Error;
use crate::types::{Nonce, NONCE_LEN};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::fmt;

/// Separator between encoded segments. Never produced by a segment codec.
pub const SEPARATOR: char = ',';

/// Per-segment byte/text codec.
pub trait SegmentCodec: Send + Sync + fmt::Debug {
    fn encode_segment(&self, bytes: &[u8]) -> String;
    fn decode_segment(&self, segment: &str) -> Result<Vec<u8>, String>;
}

/// Standard-alphabet, padded base64.
#[derive(Debug, Clone, Copy, Default)]
pub struct Base64Segments;

impl SegmentCodec for Base64Segments {
    fn encode_segment(&self, bytes: &[u8]) -> String {
        STANDARD.encode(bytes)
    }

    fn decode_segment(&self, segment: &str) -> Result<Vec<u8>, String> {
        STANDARD.decode(segment).map_err(|e| e.to_string())
    }
}

/// Lowercase hex.
#[derive(Debug, Clone, Copy, Default)]
pub struct HexSegments;

impl SegmentCodec for HexSegments {
    fn encode_segment(&self, bytes: &[u8]) -> String {
        hex::encode(bytes)
    }

    fn decode_segment(&self, segment: &str) -> Result<Vec<u8>, String> {
        hex::decode(segment).map_err(|e| e.to_string())
    }
}

/// Encode byte sequences with `codec`.
///
/// The empty list encodes to the empty string.
pub fn encode_with<T: AsRef<[u8]>>(codec: &dyn SegmentCodec, nonces: &[T]) -> String {
    let segments: Vec<String> = nonces
        .iter()
        .map(|n| codec.encode_segment(n.as_ref()))
        .collect();
    segments.join(SEPARATOR.to_string().as_str())
}

/// Decode a string produced by [`encode_with`] using the same `codec`.
pub fn decode_with(codec: &dyn SegmentCodec, encoded: &str) -> Result<Vec<Vec<u8>>, Error> {
    if encoded.is_empty() {
        return Ok(Vec::new());
    }
    encoded
        .split(SEPARATOR)
        .enumerate()
        .map(|(idx, segment)| {
            codec
                .decode_segment(segment)
                .map_err(|e| Error::MalformedProof(format!("segment {idx}: {e}")))
        })
        .collect()
}

/// Decode and require every segment to be a full nonce.
pub fn decode_nonces_with(codec: &dyn SegmentCodec, encoded: &str) -> Result<Vec<Nonce>, Error> {
    decode_with(codec, encoded)?
        .into_iter()
        .enumerate()
        .map(|(idx, bytes)| {
            let len = bytes.len();
            Nonce::try_from(bytes).map_err(|_| {
                Error::MalformedProof(format!(
                    "segment {idx}: expected {NONCE_LEN} bytes, got {len}"
                ))
            })
        })
        .collect()
}

/// [`encode_with`] using [`Base64Segments`].
pub fn encode<T: AsRef<[u8]>>(nonces: &[T]) -> String {
    encode_with(&Base64Segments, nonces)
}

/// [`decode_with`] using [`Base64Segments`].
pub fn decode(encoded: &str) -> Result<Vec<Vec<u8>>, Error> {
    decode_with(&Base64Segments, encoded)
}

/// [`decode_nonces_with`] using [`Base64Segments`].
pub fn decode_nonces(encoded: &str) -> Result<Vec<Nonce>, Error> {
    decode_nonces_with(&Base64Segments, encoded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_mixed_lengths() {
        let nonces: Vec<Vec<u8>> = vec![vec![0u8; 32], vec![255, 1, 2], vec![], vec![7; 5]];
        for codec in [&Base64Segments as &dyn SegmentCodec, &HexSegments] {
            let encoded = encode_with(codec, &nonces);
            assert_eq!(decode_with(codec, &encoded).unwrap(), nonces, "{codec:?}");
        }
    }

    #[test]
    fn base64_layout_matches_comma_joined_segments() {
        let encoded = encode(&[[0u8, 0, 0], [255, 255, 255]]);
        assert_eq!(encoded, "AAAA,////");
    }

    #[test]
    fn empty_list_is_empty_string() {
        let none: [Nonce; 0] = [];
        assert_eq!(encode(&none), "");
        assert!(decode("").unwrap().is_empty());
    }

    #[test]
    fn corrupt_segment_is_malformed_proof() {
        let encoded = format!("{},%%%", encode(&[[1u8; 32]]));
        let err = decode(&encoded).expect_err("corrupt segment");
        assert!(matches!(err, Error::MalformedProof(msg) if msg.starts_with("segment 1")));
    }

    #[test]
    fn decode_nonces_rejects_short_segments() {
        let encoded = encode(&[vec![1u8; 32], vec![2u8; 31]]);
        let err = decode_nonces(&encoded).expect_err("short nonce");
        assert!(matches!(err, Error::MalformedProof(_)));

        let encoded = encode(&[[1u8; 32], [2u8; 32]]);
        assert_eq!(decode_nonces(&encoded).unwrap(), vec![[1u8; 32], [2u8; 32]]);
    }
}
