use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

use super::chunker::ResamplerQuality;

/// Streaming resampler for mono f32 audio using Rubato's sinc interpolation.
///
/// - Maintains internal buffers to handle arbitrary-sized input chunks
/// - Uses Rubato's SincFixedIn for high-quality, configurable resampling
/// - Automatically handles buffering for Rubato's fixed chunk requirements
pub struct StreamResampler {
    in_rate: u32,
    out_rate: u32,
    resampler: SincFixedIn<f32>,
    /// Input buffer for accumulating samples
    input_buffer: Vec<f32>,
    /// Chunk size required by Rubato
    chunk_size: usize,
}

impl StreamResampler {
    /// Create a new mono resampler from in_rate -> out_rate.
    pub fn new(in_rate: u32, out_rate: u32) -> Self {
        Self::new_with_quality(in_rate, out_rate, ResamplerQuality::Balanced)
    }

    /// Create a new mono resampler with specified quality preset.
    pub fn new_with_quality(in_rate: u32, out_rate: u32, quality: ResamplerQuality) -> Self {
        // 512 samples keeps latency well under one capture block.
        let chunk_size = 512;

        let sinc_params = match quality {
            ResamplerQuality::Fast => SincInterpolationParameters {
                sinc_len: 32,
                f_cutoff: 0.92,
                interpolation: SincInterpolationType::Linear,
                oversampling_factor: 64,
                window: WindowFunction::Blackman,
            },
            ResamplerQuality::Balanced => SincInterpolationParameters {
                sinc_len: 64,
                f_cutoff: 0.95,
                interpolation: SincInterpolationType::Cubic,
                oversampling_factor: 128,
                window: WindowFunction::Blackman2,
            },
            ResamplerQuality::Quality => SincInterpolationParameters {
                sinc_len: 128,
                f_cutoff: 0.97,
                interpolation: SincInterpolationType::Cubic,
                oversampling_factor: 256,
                window: WindowFunction::BlackmanHarris2,
            },
        };

        let resampler = SincFixedIn::<f32>::new(
            out_rate as f64 / in_rate as f64,
            2.0,
            sinc_params,
            chunk_size,
            1, // mono
        )
        .expect("Failed to create Rubato resampler");

        Self {
            in_rate,
            out_rate,
            resampler,
            input_buffer: Vec::with_capacity(chunk_size * 2),
            chunk_size,
        }
    }

    /// Process an arbitrary chunk of mono f32 samples.
    /// Returns a freshly allocated Vec with resampled audio at out_rate.
    pub fn process(&mut self, input: &[f32]) -> Vec<f32> {
        if self.in_rate == self.out_rate {
            // Fast path: no conversion needed
            return input.to_vec();
        }

        self.input_buffer.extend_from_slice(input);

        let mut output = Vec::new();
        while self.input_buffer.len() >= self.chunk_size {
            let chunk: Vec<f32> = self.input_buffer.drain(..self.chunk_size).collect();
            let input_frames = vec![chunk];

            match self.resampler.process(&input_frames, None) {
                Ok(frames) => {
                    if let Some(channel) = frames.first() {
                        output.extend_from_slice(channel);
                    }
                }
                Err(e) => {
                    tracing::error!("Resampler error: {}", e);
                    // Drop this chunk to maintain stream continuity
                }
            }
        }

        output
    }

    /// Reset internal state, clearing buffers and resetting the resampler.
    pub fn reset(&mut self) {
        self.input_buffer.clear();
        self.resampler.reset();
    }

    /// Current input rate.
    pub fn input_rate(&self) -> u32 {
        self.in_rate
    }

    /// Current output rate.
    pub fn output_rate(&self) -> u32 {
        self.out_rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn downsample_48k_to_16k_ramp() {
        let mut rs = StreamResampler::new(48_000, 16_000);
        // ~0.1s of input. Expect roughly a third of it out.
        let n_in = 4_800;
        let input: Vec<f32> = (0..n_in).map(|i| (i % 100) as f32 / 100.0).collect();

        let mut all_output = Vec::new();
        for chunk in input.chunks(1000) {
            all_output.extend(rs.process(chunk));
        }

        assert!(
            all_output.len() >= 1400 && all_output.len() <= 1700,
            "Expected ~1600 samples, got {}",
            all_output.len()
        );
    }

    #[test]
    fn passthrough_same_rate() {
        let mut rs = StreamResampler::new(16_000, 16_000);
        let input = vec![0.1f32, 0.2, 0.3, 0.4, 0.5];
        let output = rs.process(&input);
        assert_eq!(input, output, "Passthrough should return identical data");
    }

    #[test]
    fn reset_clears_pending_input() {
        let mut rs = StreamResampler::new(48_000, 16_000);
        // Less than one rubato chunk: stays buffered.
        let _ = rs.process(&[0.5f32; 100]);
        rs.reset();
        // After reset, the partial chunk must not leak into new output.
        let out = rs.process(&[0.0f32; 512]);
        assert!(out.iter().all(|&s| s.abs() < 0.05));
    }

    #[test]
    fn process_with_all_quality_presets() {
        let input: Vec<f32> = (0..4096).map(|i| ((i % 100) as f32 - 50.0) / 50.0).collect();
        for q in [
            ResamplerQuality::Fast,
            ResamplerQuality::Balanced,
            ResamplerQuality::Quality,
        ] {
            let mut rs = StreamResampler::new_with_quality(48_000, 16_000, q);
            let mut out = rs.process(&input);
            out.extend(rs.process(&input));
            assert!(!out.is_empty());
        }
    }
}
