//! Gapless playback scheduling with interruption handling.
//!
//! The scheduler owns the playback cursor and the active source set;
//! nothing else touches them. It talks to the output device through
//! the [`AudioOut`] seam so scheduling invariants can be tested
//! against a virtual output clock.

use std::collections::HashSet;
use tokio::sync::watch;

use super::constants::OUTPUT_SAMPLE_RATE_HZ;
use super::pcm::{self, DecodeError};

/// Handle for one scheduled-but-unfinished buffer.
pub type SourceId = u64;

/// Seam between the scheduler and the output device.
///
/// `now` is the output clock in seconds of audio actually played.
/// `poll_finished` reports sources that reached their natural end;
/// force-stopped sources are never reported there.
pub trait AudioOut: Send {
    fn now(&self) -> f64;
    fn play(&mut self, samples: Vec<f32>, at: f64) -> SourceId;
    fn stop_all(&mut self);
    fn poll_finished(&mut self) -> Vec<SourceId>;
}

pub struct PlaybackScheduler<O: AudioOut> {
    out: O,
    /// Earliest time the next chunk may begin on the output clock.
    /// Monotonically non-decreasing except on interruption reset.
    next_start_time: f64,
    active: HashSet<SourceId>,
    speaking_tx: watch::Sender<bool>,
}

impl<O: AudioOut> PlaybackScheduler<O> {
    pub fn new(out: O) -> Self {
        let (speaking_tx, _) = watch::channel(false);
        Self {
            out,
            next_start_time: 0.0,
            active: HashSet::new(),
            speaking_tx,
        }
    }

    /// The empty/non-empty transitions of the active set, as a flag.
    pub fn subscribe_speaking(&self) -> watch::Receiver<bool> {
        self.speaking_tx.subscribe()
    }

    pub fn is_speaking(&self) -> bool {
        *self.speaking_tx.borrow()
    }

    /// Decode a raw 16-bit LE PCM chunk and schedule it back-to-back
    /// after whatever is already queued.
    ///
    /// An empty payload schedules nothing and is not an error. A
    /// malformed payload is an error the caller logs and drops; the
    /// pipeline itself keeps running.
    pub fn decode_and_schedule(&mut self, bytes: &[u8]) -> Result<(), DecodeError> {
        let samples = pcm::pcm16_to_f32(bytes)?;
        if samples.is_empty() {
            return Ok(());
        }

        self.reap_finished();

        let start = self.next_start_time.max(self.out.now());
        let duration = samples.len() as f64 / OUTPUT_SAMPLE_RATE_HZ as f64;
        let id = self.out.play(samples, start);
        self.next_start_time = start + duration;
        self.active.insert(id);
        self.speaking_tx.send_if_modified(|speaking| {
            let changed = !*speaking;
            *speaking = true;
            changed
        });
        Ok(())
    }

    /// Drain naturally-finished sources and update the speaking flag.
    /// Called on a timer by the session loop so "speech ended" fires
    /// even when no further chunks arrive.
    pub fn poll(&mut self) {
        self.reap_finished();
    }

    /// Server-initiated interruption: the user started talking over
    /// the agent. Stop everything immediately and reset the cursor so
    /// the next reply starts at the current clock time, not at a
    /// stale future timestamp.
    pub fn interrupt(&mut self) {
        self.out.stop_all();
        self.active.clear();
        self.next_start_time = 0.0;
        self.set_not_speaking();
    }

    /// Direct access to the output seam, mainly for tests driving a
    /// virtual clock.
    pub fn out_mut(&mut self) -> &mut O {
        &mut self.out
    }

    pub fn active_sources(&self) -> usize {
        self.active.len()
    }

    pub fn next_start_time(&self) -> f64 {
        self.next_start_time
    }

    pub fn output_clock(&self) -> f64 {
        self.out.now()
    }

    fn reap_finished(&mut self) {
        for id in self.out.poll_finished() {
            self.active.remove(&id);
        }
        if self.active.is_empty() {
            self.set_not_speaking();
        }
    }

    fn set_not_speaking(&mut self) {
        self.speaking_tx.send_if_modified(|speaking| {
            let changed = *speaking;
            *speaking = false;
            changed
        });
    }
}

/// Virtual output for deterministic tests: time advances only when
/// told to, and sources finish exactly when the clock passes their
/// end time.
#[derive(Default)]
pub struct VirtualOut {
    now: f64,
    next_id: SourceId,
    playing: Vec<VirtualSource>,
    finished: Vec<SourceId>,
    /// Every `play` call ever made, for ordering assertions.
    pub scheduled: Vec<ScheduledCall>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduledCall {
    pub id: SourceId,
    pub start: f64,
    pub duration: f64,
}

struct VirtualSource {
    id: SourceId,
    end: f64,
}

impl VirtualOut {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance the virtual output clock, finishing sources whose end
    /// time has passed.
    pub fn advance(&mut self, seconds: f64) {
        self.now += seconds;
        let now = self.now;
        let (done, still): (Vec<_>, Vec<_>) =
            self.playing.drain(..).partition(|s| s.end <= now);
        self.finished.extend(done.into_iter().map(|s| s.id));
        self.playing = still;
    }

    pub fn playing_count(&self) -> usize {
        self.playing.len()
    }
}

impl AudioOut for VirtualOut {
    fn now(&self) -> f64 {
        self.now
    }

    fn play(&mut self, samples: Vec<f32>, at: f64) -> SourceId {
        let id = self.next_id;
        self.next_id += 1;
        let duration = samples.len() as f64 / OUTPUT_SAMPLE_RATE_HZ as f64;
        self.playing.push(VirtualSource {
            id,
            end: at + duration,
        });
        self.scheduled.push(ScheduledCall {
            id,
            start: at,
            duration,
        });
        id
    }

    fn stop_all(&mut self) {
        // Force stop: sources vanish without a completion report.
        self.playing.clear();
    }

    fn poll_finished(&mut self) -> Vec<SourceId> {
        std::mem::take(&mut self.finished)
    }
}
