use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::capture::CaptureFrame;
use super::constants::{CAPTURE_BLOCK_SAMPLES, INPUT_SAMPLE_RATE_HZ};
use super::resampler::StreamResampler;

#[derive(Debug, Clone, Copy)]
pub enum ResamplerQuality {
    Fast,     // Lower quality, lower CPU usage
    Balanced, // Default quality/performance balance
    Quality,  // Higher quality, higher CPU usage
}

pub struct BlockAssemblerConfig {
    pub block_size_samples: usize,
    pub sample_rate_hz: u32,
    pub resampler_quality: ResamplerQuality,
}

impl Default for BlockAssemblerConfig {
    fn default() -> Self {
        Self {
            block_size_samples: CAPTURE_BLOCK_SAMPLES,
            sample_rate_hz: INPUT_SAMPLE_RATE_HZ,
            resampler_quality: ResamplerQuality::Balanced,
        }
    }
}

/// Turns raw device frames into fixed-size mono blocks at the wire rate.
///
/// Device audio arrives at whatever rate and channel count the
/// hardware negotiated; each frame is downmixed to mono, resampled
/// to 16 kHz, and accumulated until a full block is ready for the
/// encoder. Blocks are independent: the only cross-block state is
/// the resampler's filter tail.
pub struct BlockAssembler {
    frame_rx: mpsc::Receiver<CaptureFrame>,
    block_tx: mpsc::Sender<Vec<f32>>,
    cfg: BlockAssemblerConfig,
    running: Arc<AtomicBool>,
}

impl BlockAssembler {
    pub fn new(
        frame_rx: mpsc::Receiver<CaptureFrame>,
        block_tx: mpsc::Sender<Vec<f32>>,
        cfg: BlockAssemblerConfig,
    ) -> Self {
        Self {
            frame_rx,
            block_tx,
            cfg,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        let mut worker = AssemblerWorker::new(self.block_tx, self.cfg);
        self.running.store(true, Ordering::SeqCst);
        let running = self.running.clone();
        let mut frame_rx = self.frame_rx;

        tokio::spawn(async move {
            tracing::info!("Block assembler started");
            while running.load(Ordering::SeqCst) {
                match frame_rx.recv().await {
                    Some(frame) => worker.ingest(&frame).await,
                    None => break, // capture side gone
                }
            }
            tracing::info!("Block assembler stopped");
        })
    }
}

struct AssemblerWorker {
    block_tx: mpsc::Sender<Vec<f32>>,
    cfg: BlockAssemblerConfig,
    buffer: VecDeque<f32>,
    resampler: Option<StreamResampler>,
    current_input_rate: Option<u32>,
    current_input_channels: Option<u16>,
}

impl AssemblerWorker {
    fn new(block_tx: mpsc::Sender<Vec<f32>>, cfg: BlockAssemblerConfig) -> Self {
        let cap = cfg.block_size_samples * 4;
        Self {
            block_tx,
            cfg,
            buffer: VecDeque::with_capacity(cap),
            resampler: None,
            current_input_rate: None,
            current_input_channels: None,
        }
    }

    async fn ingest(&mut self, frame: &CaptureFrame) {
        if self.current_input_rate != Some(frame.sample_rate)
            || self.current_input_channels != Some(frame.channels)
        {
            self.reconfigure_for_device(frame);
        }

        let processed = self.process_frame(frame);
        self.buffer.extend(processed);
        self.flush_ready_blocks().await;
    }

    async fn flush_ready_blocks(&mut self) {
        let bs = self.cfg.block_size_samples;
        while self.buffer.len() >= bs {
            let block: Vec<f32> = self.buffer.drain(..bs).collect();

            // Fire-and-forget toward the session: if the outbound
            // side lags, the block is dropped rather than stalling
            // the capture path.
            if let Err(e) = self.block_tx.try_send(block) {
                tracing::warn!("Dropping capture block: {}", e);
            }
        }
    }

    fn reconfigure_for_device(&mut self, frame: &CaptureFrame) {
        let needs_resampling = frame.sample_rate != self.cfg.sample_rate_hz;

        if needs_resampling {
            tracing::info!(
                "Configuring resampler: {}Hz {} ch -> {}Hz mono",
                frame.sample_rate,
                frame.channels,
                self.cfg.sample_rate_hz
            );
            self.resampler = Some(StreamResampler::new_with_quality(
                frame.sample_rate,
                self.cfg.sample_rate_hz,
                self.cfg.resampler_quality,
            ));
        } else {
            tracing::info!(
                "Device already at target rate {}Hz, no resampling needed",
                frame.sample_rate
            );
            self.resampler = None;
        }

        self.current_input_rate = Some(frame.sample_rate);
        self.current_input_channels = Some(frame.channels);
    }

    fn process_frame(&mut self, frame: &CaptureFrame) -> Vec<f32> {
        let mono_samples = if frame.channels == 1 {
            frame.samples.clone()
        } else {
            // Convert multi-channel to mono by averaging
            let channels = frame.channels as usize;
            frame
                .samples
                .chunks_exact(channels)
                .map(|chunk| chunk.iter().sum::<f32>() / channels as f32)
                .collect()
        };

        match &mut self.resampler {
            Some(resampler) => resampler.process(&mono_samples),
            None => mono_samples,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn worker_with_channel() -> (AssemblerWorker, mpsc::Receiver<Vec<f32>>) {
        let (tx, rx) = mpsc::channel(16);
        let worker = AssemblerWorker::new(tx, BlockAssemblerConfig::default());
        (worker, rx)
    }

    #[test]
    fn stereo_to_mono_averaging() {
        let (mut worker, _rx) = worker_with_channel();
        let frame = CaptureFrame {
            samples: vec![0.5, -0.5, 0.4, -0.4, 0.2, 0.2],
            sample_rate: 16_000,
            channels: 2,
        };
        worker.reconfigure_for_device(&frame);
        let out = worker.process_frame(&frame);
        assert_eq!(out.len(), 3);
        assert!(out[0].abs() < 1e-6);
        assert!(out[1].abs() < 1e-6);
        assert!((out[2] - 0.2).abs() < 1e-6);
    }

    #[test]
    fn reconfigure_resampler_on_rate_change() {
        let (mut worker, _rx) = worker_with_channel();

        let frame_48k = CaptureFrame {
            samples: vec![0.0; 480],
            sample_rate: 48_000,
            channels: 2,
        };
        worker.reconfigure_for_device(&frame_48k);
        assert!(worker.resampler.is_some());

        let frame_16k = CaptureFrame {
            samples: vec![0.0; 160],
            sample_rate: 16_000,
            channels: 1,
        };
        worker.reconfigure_for_device(&frame_16k);
        assert!(worker.resampler.is_none());
    }

    #[tokio::test]
    async fn blocks_are_exactly_4096_samples() {
        let (mut worker, mut rx) = worker_with_channel();
        // 16 kHz mono passthrough: 3 frames of 2048 -> one full block
        // plus a half block left buffered.
        for _ in 0..3 {
            let frame = CaptureFrame {
                samples: vec![0.1; 2048],
                sample_rate: 16_000,
                channels: 1,
            };
            worker.ingest(&frame).await;
        }
        let block = rx.try_recv().unwrap();
        assert_eq!(block.len(), CAPTURE_BLOCK_SAMPLES);
        assert!(rx.try_recv().is_err());
        assert_eq!(worker.buffer.len(), 2048);
    }
}
