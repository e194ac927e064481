//! Device-backed implementation of the [`AudioOut`] seam.
//!
//! The cpal output stream lives on its own OS thread (streams are
//! `!Send`). The stream callback and the scheduler share a mixer
//! behind a mutex: the callback sums whatever sources overlap the
//! frames it is asked to fill, advances the sample-counter output
//! clock, and reports sources that played to their natural end.

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{SampleRate, Stream, StreamConfig};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tokio::sync::mpsc;

use super::constants::OUTPUT_SAMPLE_RATE_HZ;
use super::device;
use super::playback::{AudioOut, SourceId};
use voxtutor_foundation::AudioError;

struct MixerSource {
    id: SourceId,
    /// Absolute output-clock sample index of the first sample.
    start: u64,
    samples: Vec<f32>,
}

#[derive(Default)]
struct MixerState {
    sources: Vec<MixerSource>,
    finished: Vec<SourceId>,
}

/// Handle to the dedicated output-stream thread.
pub struct OutputThread {
    handle: Option<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
}

impl OutputThread {
    /// Open the default output device at the fixed 24 kHz mono rate
    /// and return the scheduler-facing half of the mixer. Runtime
    /// stream errors go to `failure_tx`; they are terminal for the
    /// session.
    pub fn spawn(failure_tx: mpsc::Sender<AudioError>) -> Result<(Self, DeviceOut), AudioError> {
        let running = Arc::new(AtomicBool::new(true));
        let shutdown = running.clone();
        let mixer = Arc::new(Mutex::new(MixerState::default()));
        let position = Arc::new(AtomicU64::new(0));

        let thread_mixer = mixer.clone();
        let thread_position = position.clone();
        let (ready_tx, ready_rx) = std::sync::mpsc::sync_channel::<Result<(), AudioError>>(1);

        let handle = thread::Builder::new()
            .name("audio-output".to_string())
            .spawn(move || {
                let stream = match build_output_stream(thread_mixer, thread_position, failure_tx) {
                    Ok(stream) => {
                        let _ = ready_tx.send(Ok(()));
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

                tracing::info!("Audio output thread shutting down.");
                drop(stream);
            })
            .map_err(|e| AudioError::Fatal(format!("Failed to spawn output thread: {}", e)))?;

        ready_rx
            .recv_timeout(Duration::from_secs(3))
            .map_err(|_| AudioError::Fatal("Output thread did not report readiness".to_string()))??;

        Ok((
            Self {
                handle: Some(handle),
                shutdown,
            },
            DeviceOut {
                mixer,
                position,
                next_id: 0,
            },
        ))
    }

    pub fn stop(mut self) {
        self.shutdown.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for OutputThread {
    fn drop(&mut self) {
        self.shutdown.store(false, Ordering::SeqCst);
    }
}

fn build_output_stream(
    mixer: Arc<Mutex<MixerState>>,
    position: Arc<AtomicU64>,
    failure_tx: mpsc::Sender<AudioError>,
) -> Result<Stream, AudioError> {
    let device = device::output_device()?;
    if let Ok(n) = device.name() {
        tracing::info!("Selected output device: {}", n);
    }

    // Fixed output clock: the wire format is 24 kHz mono, so the
    // sink is opened at exactly that rate rather than negotiating.
    let config = StreamConfig {
        channels: 1,
        sample_rate: SampleRate(OUTPUT_SAMPLE_RATE_HZ),
        buffer_size: cpal::BufferSize::Default,
    };

    let stream = device.build_output_stream(
        &config,
        move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
            mix(&mixer, &position, data);
        },
        move |err| {
            tracing::error!("Audio output stream error: {}", err);
            let _ = failure_tx.try_send(AudioError::Cpal(err));
        },
        None,
    )?;

    stream.play()?;
    Ok(stream)
}

/// Fill one callback buffer: sum every source overlapping the frame
/// range, advance the sample-counter clock, and report sources that
/// reached their natural end.
fn mix(mixer: &Mutex<MixerState>, position: &AtomicU64, data: &mut [f32]) {
    let base = position.fetch_add(data.len() as u64, Ordering::SeqCst);
    let end = base + data.len() as u64;
    data.fill(0.0);

    let mut mixer = mixer.lock();
    let mut i = 0;
    while i < mixer.sources.len() {
        let src = &mixer.sources[i];
        let src_end = src.start + src.samples.len() as u64;
        if src.start < end && src_end > base {
            let from = src.start.max(base);
            let to = src_end.min(end);
            for p in from..to {
                data[(p - base) as usize] += src.samples[(p - src.start) as usize];
            }
        }
        if src_end <= end {
            let done = mixer.sources.swap_remove(i);
            mixer.finished.push(done.id);
        } else {
            i += 1;
        }
    }
}

/// Scheduler-facing half of the output mixer. `Send`: holds only
/// shared handles, never the stream itself.
pub struct DeviceOut {
    mixer: Arc<Mutex<MixerState>>,
    position: Arc<AtomicU64>,
    next_id: SourceId,
}

impl AudioOut for DeviceOut {
    fn now(&self) -> f64 {
        self.position.load(Ordering::SeqCst) as f64 / OUTPUT_SAMPLE_RATE_HZ as f64
    }

    fn play(&mut self, samples: Vec<f32>, at: f64) -> SourceId {
        let id = self.next_id;
        self.next_id += 1;
        let start = (at * OUTPUT_SAMPLE_RATE_HZ as f64).round() as u64;
        self.mixer.lock().sources.push(MixerSource { id, start, samples });
        id
    }

    fn stop_all(&mut self) {
        // Force stop: discarded sources are not reported as finished.
        self.mixer.lock().sources.clear();
    }

    fn poll_finished(&mut self) -> Vec<SourceId> {
        std::mem::take(&mut self.mixer.lock().finished)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device_out_with_parts() -> (DeviceOut, Arc<Mutex<MixerState>>, Arc<AtomicU64>) {
        let mixer = Arc::new(Mutex::new(MixerState::default()));
        let position = Arc::new(AtomicU64::new(0));
        (
            DeviceOut {
                mixer: mixer.clone(),
                position: position.clone(),
                next_id: 0,
            },
            mixer,
            position,
        )
    }

    #[test]
    fn clock_advances_with_frames_played() {
        let (out, mixer, position) = device_out_with_parts();
        let mut buf = vec![0.0f32; 2400];
        mix(&mixer, &position, &mut buf);
        assert!((out.now() - 0.1).abs() < 1e-9);
    }

    #[test]
    fn scheduled_source_plays_at_its_start_sample() {
        let (mut out, mixer, position) = device_out_with_parts();
        // Source starting at sample 4 within the first callback.
        let at = 4.0 / OUTPUT_SAMPLE_RATE_HZ as f64;
        out.play(vec![0.5f32; 3], at);

        let mut buf = vec![0.0f32; 10];
        mix(&mixer, &position, &mut buf);
        assert_eq!(&buf[..4], &[0.0; 4]);
        assert_eq!(&buf[4..7], &[0.5; 3]);
        assert_eq!(&buf[7..], &[0.0; 3]);
    }

    #[test]
    fn finished_source_is_reported_exactly_once() {
        let (mut out, mixer, position) = device_out_with_parts();
        let id = out.play(vec![0.1f32; 8], 0.0);

        let mut buf = vec![0.0f32; 16];
        mix(&mixer, &position, &mut buf);
        assert_eq!(out.poll_finished(), vec![id]);
        assert!(out.poll_finished().is_empty());
    }

    #[test]
    fn stop_all_discards_without_completion_reports() {
        let (mut out, mixer, position) = device_out_with_parts();
        out.play(vec![0.1f32; 100], 0.0);
        out.stop_all();

        let mut buf = vec![1.0f32; 64];
        mix(&mixer, &position, &mut buf);
        assert!(buf.iter().all(|&s| s == 0.0));
        assert!(out.poll_finished().is_empty());
    }

    #[test]
    fn overlapping_sources_are_summed() {
        let (mut out, mixer, position) = device_out_with_parts();
        out.play(vec![0.25f32; 4], 0.0);
        out.play(vec![0.25f32; 4], 0.0);

        let mut buf = vec![0.0f32; 4];
        mix(&mixer, &position, &mut buf);
        assert!(buf.iter().all(|&s| (s - 0.5).abs() < 1e-6));
    }
}
