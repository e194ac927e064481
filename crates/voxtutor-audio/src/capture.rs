use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{SampleFormat, Stream, StreamConfig};

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tokio::sync::mpsc;

use super::device;
use voxtutor_foundation::AudioError;

/// One callback's worth of raw microphone audio, in the device's
/// native rate and channel count. Normalization to the wire format
/// happens downstream in the block assembler.
#[derive(Debug, Clone)]
pub struct CaptureFrame {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

/// Negotiated input device configuration.
#[derive(Debug, Clone, Copy)]
pub struct DeviceConfig {
    pub sample_rate: u32,
    pub channels: u16,
}

#[derive(Debug, Default)]
pub struct CaptureStats {
    pub frames_captured: AtomicU64,
    pub frames_dropped: AtomicU64,
}

/// Handle to the dedicated microphone thread.
///
/// The cpal `Stream` is `!Send`, so it lives on its own OS thread
/// for the duration of the session. Frames are forwarded to the
/// async side fire-and-forget: if the channel is full the frame is
/// dropped and counted, never blocking the audio callback.
pub struct CaptureThread {
    handle: Option<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
    stats: Arc<CaptureStats>,
}

impl CaptureThread {
    /// `failure_tx` receives runtime stream errors; a broken stream is
    /// terminal for the session, so the receiver's owner must tear
    /// everything down when one arrives.
    pub fn spawn(
        device_name: Option<String>,
        frame_tx: mpsc::Sender<CaptureFrame>,
        failure_tx: mpsc::Sender<AudioError>,
    ) -> Result<(Self, DeviceConfig), AudioError> {
        let running = Arc::new(AtomicBool::new(true));
        let shutdown = running.clone();
        let stats = Arc::new(CaptureStats::default());
        let thread_stats = stats.clone();

        let (ready_tx, ready_rx) = std::sync::mpsc::sync_channel::<Result<DeviceConfig, AudioError>>(1);

        let handle = thread::Builder::new()
            .name("audio-capture".to_string())
            .spawn(move || {
                let stream = match build_capture_stream(
                    device_name.as_deref(),
                    frame_tx,
                    failure_tx,
                    thread_stats,
                    running.clone(),
                ) {
                    Ok((stream, cfg)) => {
                        let _ = ready_tx.send(Ok(cfg));
                        stream
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };

                while running.load(Ordering::SeqCst) {
                    thread::sleep(Duration::from_millis(100));
                }

                tracing::info!("Audio capture thread shutting down.");
                drop(stream);
            })
            .map_err(|e| AudioError::Fatal(format!("Failed to spawn audio thread: {}", e)))?;

        let cfg = ready_rx
            .recv_timeout(Duration::from_secs(3))
            .map_err(|_| AudioError::Fatal("Capture thread did not report readiness".to_string()))??;

        Ok((
            Self {
                handle: Some(handle),
                shutdown,
                stats,
            },
            cfg,
        ))
    }

    pub fn stats(&self) -> &CaptureStats {
        &self.stats
    }

    pub fn stop(mut self) {
        self.shutdown.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for CaptureThread {
    fn drop(&mut self) {
        self.shutdown.store(false, Ordering::SeqCst);
    }
}

fn build_capture_stream(
    device_name: Option<&str>,
    frame_tx: mpsc::Sender<CaptureFrame>,
    failure_tx: mpsc::Sender<AudioError>,
    stats: Arc<CaptureStats>,
    running: Arc<AtomicBool>,
) -> Result<(Stream, DeviceConfig), AudioError> {
    let device = device::input_device(device_name)?;
    if let Ok(n) = device.name() {
        tracing::info!("Selected input device: {}", n);
    }

    let default_config = device.default_input_config()?;
    let sample_format = default_config.sample_format();
    let config = StreamConfig {
        channels: default_config.channels(),
        sample_rate: default_config.sample_rate(),
        buffer_size: cpal::BufferSize::Default,
    };
    let device_config = DeviceConfig {
        sample_rate: config.sample_rate.0,
        channels: config.channels,
    };

    // Common handler after converting to f32
    let handle_f32 = move |samples: Vec<f32>| {
        if !running.load(Ordering::SeqCst) {
            return;
        }
        let frame = CaptureFrame {
            samples,
            sample_rate: device_config.sample_rate,
            channels: device_config.channels,
        };
        match frame_tx.try_send(frame) {
            Ok(()) => {
                stats.frames_captured.fetch_add(1, Ordering::Relaxed);
            }
            Err(_) => {
                stats.frames_dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
    };

    // No restart path: a broken stream ends the session, so the
    // error is forwarded for teardown rather than handled here.
    let err_fn = move |err: cpal::StreamError| {
        tracing::error!("Audio stream error: {}", err);
        let _ = failure_tx.try_send(AudioError::Cpal(err));
    };

    let stream = match sample_format {
        SampleFormat::F32 => device.build_input_stream(
            &config,
            move |data: &[f32], _: &_| {
                handle_f32(data.to_vec());
            },
            err_fn,
            None,
        ),
        SampleFormat::I16 => device.build_input_stream(
            &config,
            move |data: &[i16], _: &_| {
                let converted = data.iter().map(|&s| s as f32 / 32768.0).collect();
                handle_f32(converted);
            },
            err_fn,
            None,
        ),
        SampleFormat::U16 => device.build_input_stream(
            &config,
            move |data: &[u16], _: &_| {
                // Center unsigned [0,65535] around zero
                let converted = data
                    .iter()
                    .map(|&s| (s as i32 - 32768) as f32 / 32768.0)
                    .collect();
                handle_f32(converted);
            },
            err_fn,
            None,
        ),
        other => {
            return Err(AudioError::FormatNotSupported {
                format: format!("{:?}", other),
            });
        }
    }
    .map_err(map_permission_error)?;

    stream.play()?;
    Ok((stream, device_config))
}

/// `DeviceNotAvailable` at build time is how cpal reports a
/// microphone the OS refuses to hand over; surface it as the
/// user-facing permission error.
fn map_permission_error(e: cpal::BuildStreamError) -> AudioError {
    match e {
        cpal::BuildStreamError::DeviceNotAvailable => AudioError::PermissionDenied(
            "the input device is unavailable or access was denied".to_string(),
        ),
        other => AudioError::BuildStream(other),
    }
}

#[cfg(test)]
mod convert_tests {
    // unit tests for sample format conversions

    #[test]
    fn i16_to_f32_basic() {
        let src = [-32768i16, -16384, 0, 16384, 32767];
        let out: Vec<f32> = src.iter().map(|&s| s as f32 / 32768.0).collect();
        assert_eq!(out[0], -1.0);
        assert_eq!(out[2], 0.0);
        assert!((out[4] - 1.0).abs() < 1e-3);
    }

    #[test]
    fn u16_to_f32_centering() {
        let src = [0u16, 32768, 65535];
        let out: Vec<f32> = src
            .iter()
            .map(|&s| (s as i32 - 32768) as f32 / 32768.0)
            .collect();
        assert_eq!(out[0], -1.0);
        assert_eq!(out[1], 0.0);
        assert!(out[2] > 0.99);
    }
}
