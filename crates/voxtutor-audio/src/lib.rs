pub mod capture;
pub mod chunker;
pub mod constants;
pub mod device;
pub mod output;
pub mod pcm;
pub mod playback;
pub mod resampler;

// Public API
pub use capture::{CaptureThread, CaptureFrame, DeviceConfig};
pub use chunker::{BlockAssembler, BlockAssemblerConfig, ResamplerQuality};
pub use constants::{CAPTURE_BLOCK_SAMPLES, INPUT_SAMPLE_RATE_HZ, OUTPUT_SAMPLE_RATE_HZ};
pub use output::{OutputThread, DeviceOut};
pub use pcm::{DecodeError, EncodedBlock};
pub use playback::{AudioOut, PlaybackScheduler, SourceId, VirtualOut};
pub use resampler::StreamResampler;
