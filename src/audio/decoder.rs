//! # Fragment Decoding
//!
//! Converts inbound media payloads into raw PCM fragments for the stitching
//! pipeline. Producers deliver each fragment as a base64 text blob wrapping
//! 16-bit little-endian signed samples.
//!
//! ## Decoding Steps:
//! 1. **Transport decode**: base64 text → raw bytes
//! 2. **Sample reinterpretation**: bytes → i16 samples (little-endian)
//! 3. **Validation**: byte count must be a whole number of samples

use base64::{engine::general_purpose, Engine as _};
use byteorder::{LittleEndian, ReadBytesExt};
use std::fmt;
use std::io::Cursor;

/// One decoded chunk of raw PCM audio received from the producer.
///
/// ## Lifecycle:
/// Created by [`decode_fragment`] from one inbound payload, held by the
/// sliding window until evicted. The sample buffer is never mutated after
/// decoding; fade shaping at render time operates on copies.
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    /// Interleaved 16-bit signed samples.
    pub samples: Vec<i16>,

    /// Position of this fragment in the session's arrival order.
    pub seq: u64,
}

impl Fragment {
    /// Number of samples in this fragment.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Reasons a media payload can fail to decode.
///
/// ## Recovery:
/// All variants are recovered locally: the fragment is dropped, the window is
/// left untouched, and the session continues.
#[derive(Debug)]
pub enum DecodeError {
    /// The base64 transport encoding could not be decoded.
    Transport(String),

    /// The decoded byte count is not a multiple of the 2-byte sample width.
    OddLength(usize),

    /// The payload decoded to zero bytes.
    Empty,
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::Transport(msg) => write!(f, "transport decode failed: {}", msg),
            DecodeError::OddLength(len) => {
                write!(f, "payload length {} is not a multiple of the sample width", len)
            }
            DecodeError::Empty => write!(f, "payload decoded to zero bytes"),
        }
    }
}

impl std::error::Error for DecodeError {}

/// Decode one inbound media payload into a [`Fragment`].
///
/// ## Parameters:
/// - **payload**: base64 text wrapping raw 16-bit little-endian PCM bytes
/// - **seq**: arrival-order index assigned by the session
///
/// ## Returns:
/// - **Ok(Fragment)**: the decoded sample buffer
/// - **Err(DecodeError)**: malformed transport encoding or truncated samples
///
/// No side effects; the caller decides whether the fragment enters the window.
pub fn decode_fragment(payload: &str, seq: u64) -> Result<Fragment, DecodeError> {
    let bytes = general_purpose::STANDARD
        .decode(payload)
        .map_err(|e| DecodeError::Transport(e.to_string()))?;

    if bytes.is_empty() {
        return Err(DecodeError::Empty);
    }
    if bytes.len() % 2 != 0 {
        return Err(DecodeError::OddLength(bytes.len()));
    }

    // Reinterpret the byte stream as 16-bit samples (little-endian)
    let mut cursor = Cursor::new(&bytes);
    let mut samples = Vec::with_capacity(bytes.len() / 2);
    while let Ok(sample) = cursor.read_i16::<LittleEndian>() {
        samples.push(sample);
    }

    Ok(Fragment { samples, seq })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_pcm(samples: &[i16]) -> String {
        let mut bytes = Vec::with_capacity(samples.len() * 2);
        for &sample in samples {
            bytes.extend_from_slice(&sample.to_le_bytes());
        }
        general_purpose::STANDARD.encode(bytes)
    }

    #[test]
    fn test_round_trip() {
        let original = vec![0i16, 1, -1, 32767, -32768, 12345];
        let payload = encode_pcm(&original);

        let fragment = decode_fragment(&payload, 7).unwrap();
        assert_eq!(fragment.samples, original);
        assert_eq!(fragment.seq, 7);
    }

    #[test]
    fn test_odd_length_rejected() {
        let payload = general_purpose::STANDARD.encode([0u8, 1, 2]);
        match decode_fragment(&payload, 0) {
            Err(DecodeError::OddLength(3)) => {}
            other => panic!("expected OddLength error, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_base64_rejected() {
        let result = decode_fragment("not!!valid//base64===", 0);
        assert!(matches!(result, Err(DecodeError::Transport(_))));
    }

    #[test]
    fn test_empty_payload_rejected() {
        let result = decode_fragment("", 0);
        assert!(matches!(result, Err(DecodeError::Empty)));
    }
}
