//! Transport codec for the realtime session.
//!
//! Outbound: f32 capture blocks -> 16-bit LE PCM -> base64.
//! Inbound: base64 -> raw bytes -> 16-bit LE PCM -> normalized f32.

use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine as _;
use thiserror::Error;

use crate::constants::INPUT_MIME_TYPE;

/// A capture block ready to be sent as a realtime media chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedBlock {
    pub mime_type: &'static str,
    pub data: String,
}

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("PCM payload has odd byte count: {len}")]
    OddByteCount { len: usize },
}

/// Encode one block of mono f32 samples for transport.
///
/// Malformed samples are never rejected: NaN becomes silence and
/// out-of-range values are clamped to [-1, 1], so a bad block from
/// the device can never take down the capture loop. Quantization is
/// round-to-nearest.
pub fn encode_block(samples: &[f32]) -> EncodedBlock {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for &s in samples {
        let v = sample_to_i16(s);
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    EncodedBlock {
        mime_type: INPUT_MIME_TYPE,
        data: B64.encode(&bytes),
    }
}

#[inline]
fn sample_to_i16(s: f32) -> i16 {
    let s = if s.is_nan() { 0.0 } else { s };
    (s.clamp(-1.0, 1.0) * 32767.0).round() as i16
}

/// Decode a base64 payload to its exact byte sequence.
///
/// Fails only on malformed base64. An empty payload is valid and
/// decodes to zero bytes.
pub fn decode_base64(data: &str) -> Result<Vec<u8>, DecodeError> {
    Ok(B64.decode(data)?)
}

/// Interpret raw bytes as 16-bit little-endian PCM and normalize to f32.
pub fn pcm16_to_f32(bytes: &[u8]) -> Result<Vec<f32>, DecodeError> {
    if bytes.len() % 2 != 0 {
        return Err(DecodeError::OddByteCount { len: bytes.len() });
    }
    Ok(bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]) as f32 / 32767.0)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::CAPTURE_BLOCK_SAMPLES;

    #[test]
    fn silent_block_encodes_to_all_zero_pcm() {
        let block = vec![0.0f32; CAPTURE_BLOCK_SAMPLES];
        let encoded = encode_block(&block);
        assert_eq!(encoded.mime_type, "audio/pcm;rate=16000");

        let bytes = decode_base64(&encoded.data).unwrap();
        assert_eq!(bytes.len(), CAPTURE_BLOCK_SAMPLES * 2);
        assert!(bytes.iter().all(|&b| b == 0));
    }

    #[test]
    fn full_scale_samples_hit_the_i16_rails() {
        assert_eq!(sample_to_i16(1.0), 32767);
        assert_eq!(sample_to_i16(-1.0), -32767);
        assert_eq!(sample_to_i16(0.0), 0);
        assert_eq!(sample_to_i16(0.5), 16384);
    }

    #[test]
    fn out_of_range_and_nan_are_clamped_not_rejected() {
        assert_eq!(sample_to_i16(2.5), 32767);
        assert_eq!(sample_to_i16(-7.0), -32767);
        assert_eq!(sample_to_i16(f32::NAN), 0);
        assert_eq!(sample_to_i16(f32::INFINITY), 32767);
        assert_eq!(sample_to_i16(f32::NEG_INFINITY), -32767);
    }

    #[test]
    fn quantization_error_is_bounded() {
        // Round trip through i16 loses at most half a quantization
        // step, comfortably inside the 1/32767 contract.
        for &s in &[0.1f32, -0.333, 0.9999, -0.0001, 0.725] {
            let v = sample_to_i16(s);
            let back = v as f32 / 32767.0;
            assert!(
                (back - s).abs() <= 1.0 / 32767.0,
                "sample {} decoded to {}",
                s,
                back
            );
        }
    }

    #[test]
    fn base64_round_trip_preserves_bytes() {
        let block = vec![0.25f32, -0.5, 0.75, -1.0];
        let encoded = encode_block(&block);
        let bytes = decode_base64(&encoded.data).unwrap();
        let samples = pcm16_to_f32(&bytes).unwrap();
        assert_eq!(samples.len(), block.len());
        for (orig, round) in block.iter().zip(samples.iter()) {
            assert!((orig - round).abs() <= 1.0 / 32767.0);
        }
    }

    #[test]
    fn malformed_base64_fails_distinctly_from_empty() {
        assert!(matches!(
            decode_base64("not*valid*base64!"),
            Err(DecodeError::Base64(_))
        ));
        // Empty payload is not an error, just zero bytes.
        assert_eq!(decode_base64("").unwrap(), Vec::<u8>::new());
        assert_eq!(pcm16_to_f32(&[]).unwrap(), Vec::<f32>::new());
    }

    #[test]
    fn odd_byte_count_is_rejected() {
        assert!(matches!(
            pcm16_to_f32(&[0x00, 0x01, 0x02]),
            Err(DecodeError::OddByteCount { len: 3 })
        ));
    }

    #[test]
    fn pcm16_decode_is_little_endian() {
        // 0x7FFF -> +1.0, 0x8001 -> -1.0 (two's complement -32767)
        let bytes = [0xFF, 0x7F, 0x01, 0x80];
        let samples = pcm16_to_f32(&bytes).unwrap();
        assert!((samples[0] - 1.0).abs() < 1e-6);
        assert!((samples[1] + 1.0).abs() < 1e-6);
    }
}
