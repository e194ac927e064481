//! Fixed parameters of the streaming pipeline.
//!
//! These are wire-contract values, not tunables: the remote session
//! consumes 16 kHz mono PCM and replies with 24 kHz mono PCM.

/// Sample rate of outbound microphone audio.
pub const INPUT_SAMPLE_RATE_HZ: u32 = 16_000;

/// Sample rate of inbound model speech.
pub const OUTPUT_SAMPLE_RATE_HZ: u32 = 24_000;

/// Size of one outbound capture block, in samples.
pub const CAPTURE_BLOCK_SAMPLES: usize = 4096;

/// MIME tag attached to every outbound block.
pub const INPUT_MIME_TYPE: &str = "audio/pcm;rate=16000";
