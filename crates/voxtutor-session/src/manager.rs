//! Session lifecycle and inbound dispatch.
//!
//! Re-expresses the vendor callback trio (onopen/onmessage/onclose)
//! as an explicit state machine with a single dispatcher, so ordering
//! and interruption behavior can be tested without a live endpoint.

use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use voxtutor_audio::{
    pcm, AudioOut, BlockAssembler, BlockAssemblerConfig, CaptureThread, OutputThread,
    PlaybackScheduler, ResamplerQuality,
};
use voxtutor_foundation::{AppError, AudioError, SessionState, StateManager};

use crate::config::{SessionConfig, UPDATE_GAME_UI};
use crate::error::SessionError;
use crate::events::{GameUpdate, UiEvent};
use crate::transport::{SessionTransport, WsTransport};
use crate::wire::{ClientMessage, ServerMessage};

/// How often the playback scheduler is polled for naturally-finished
/// sources, so "speech ended" fires even when no message arrives.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

const FRAME_CHANNEL_CAPACITY: usize = 64;
const BLOCK_CHANNEL_CAPACITY: usize = 32;
const UI_CHANNEL_CAPACITY: usize = 32;

#[derive(Debug, Clone)]
pub struct StartOptions {
    pub api_key: String,
    pub input_device: Option<String>,
    pub resampler_quality: ResamplerQuality,
}

/// Channels handed to the UI collaborator on a successful start.
pub struct SessionHandle {
    pub ui_rx: mpsc::Receiver<UiEvent>,
    pub speaking_rx: watch::Receiver<bool>,
}

struct Running {
    stop_tx: watch::Sender<bool>,
    run_handle: JoinHandle<()>,
}

/// Owns the single live session. Exactly one may be active at a time;
/// `start` while active is a no-op and `stop` is idempotent.
pub struct Session {
    cfg: SessionConfig,
    opts: StartOptions,
    state: StateManager,
    running: Option<Running>,
}

impl Session {
    pub fn new(cfg: SessionConfig, opts: StartOptions) -> Self {
        Self {
            cfg,
            opts,
            state: StateManager::new(),
            running: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state.current()
    }

    /// Bring the pipeline up: microphone, output sink, remote session,
    /// then the capture wiring. Every failure is terminal for this
    /// attempt and returns the session to Idle; the caller decides
    /// whether the user retries.
    pub async fn start(&mut self) -> Result<Option<SessionHandle>, AppError> {
        if self.state.current() != SessionState::Idle {
            return Ok(None);
        }
        self.state.transition(SessionState::Starting)?;

        // Runtime stream failures from either audio thread end the
        // session; capacity 2 holds one report per stream.
        let (failure_tx, failure_rx) = mpsc::channel::<AudioError>(2);

        let (frame_tx, frame_rx) = mpsc::channel(FRAME_CHANNEL_CAPACITY);
        let capture = match CaptureThread::spawn(
            self.opts.input_device.clone(),
            frame_tx,
            failure_tx.clone(),
        ) {
            Ok((capture, device_cfg)) => {
                tracing::info!(
                    "Microphone open: {} Hz, {} ch",
                    device_cfg.sample_rate,
                    device_cfg.channels
                );
                capture
            }
            Err(e) => {
                self.state.transition(SessionState::Idle)?;
                return Err(e.into());
            }
        };

        let (block_tx, block_rx) = mpsc::channel(BLOCK_CHANNEL_CAPACITY);
        let assembler_cfg = BlockAssemblerConfig {
            resampler_quality: self.opts.resampler_quality,
            ..BlockAssemblerConfig::default()
        };
        let assembler_handle = BlockAssembler::new(frame_rx, block_tx, assembler_cfg).spawn();

        let (output, device_out) = match OutputThread::spawn(failure_tx) {
            Ok(parts) => parts,
            Err(e) => {
                assembler_handle.abort();
                capture.stop();
                self.state.transition(SessionState::Idle)?;
                return Err(e.into());
            }
        };

        let scheduler = PlaybackScheduler::new(device_out);
        let speaking_rx = scheduler.subscribe_speaking();

        let transport =
            match WsTransport::connect(&self.opts.api_key, self.cfg.to_setup()).await {
                Ok(t) => t,
                Err(e) => {
                    assembler_handle.abort();
                    capture.stop();
                    output.stop();
                    self.state.transition(SessionState::Idle)?;
                    return Err(AppError::Session(e.to_string()));
                }
            };

        self.state.transition(SessionState::Active)?;

        let (ui_tx, ui_rx) = mpsc::channel(UI_CHANNEL_CAPACITY);
        let (stop_tx, stop_rx) = watch::channel(false);
        let run_handle = tokio::spawn(run_loop(
            transport,
            scheduler,
            block_rx,
            failure_rx,
            ui_tx,
            stop_rx,
            self.state.clone(),
            Some(capture),
            Some(output),
        ));

        self.running = Some(Running {
            stop_tx,
            run_handle,
        });

        Ok(Some(SessionHandle { ui_rx, speaking_rx }))
    }

    /// Tear the session down. Safe to call in any state; calling it
    /// when already Idle does nothing.
    pub async fn stop(&mut self) {
        if let Some(running) = self.running.take() {
            let _ = running.stop_tx.send(true);
            if let Err(e) = running.run_handle.await {
                tracing::warn!("Session task ended abnormally: {}", e);
            }
        }
    }
}

/// The single serialized event loop of an active session: outbound
/// capture blocks, inbound dispatch, audio stream failures, scheduler
/// polling, and stop.
#[allow(clippy::too_many_arguments)]
pub async fn run_loop<T, O>(
    mut transport: T,
    mut scheduler: PlaybackScheduler<O>,
    mut block_rx: mpsc::Receiver<Vec<f32>>,
    mut failure_rx: mpsc::Receiver<AudioError>,
    ui_tx: mpsc::Sender<UiEvent>,
    mut stop_rx: watch::Receiver<bool>,
    state: StateManager,
    capture: Option<CaptureThread>,
    output: Option<OutputThread>,
) where
    T: SessionTransport,
    O: AudioOut,
{
    let mut tick = tokio::time::interval(POLL_INTERVAL);
    tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut speaking = false;

    loop {
        tokio::select! {
            Some(block) = block_rx.recv() => {
                let encoded = pcm::encode_block(&block);
                if let Err(e) = transport.send(ClientMessage::realtime_audio(encoded)).await {
                    tracing::error!("Outbound send failed, ending session: {}", e);
                    break;
                }
            }
            inbound = transport.recv() => match inbound {
                Some(Ok(msg)) => {
                    if let Err(e) = dispatch(&msg, &mut scheduler, &mut transport, &ui_tx).await {
                        tracing::error!("Dispatch failed, ending session: {}", e);
                        break;
                    }
                }
                Some(Err(e)) => {
                    tracing::error!("Transport error, ending session: {}", e);
                    break;
                }
                None => {
                    // Server-initiated close: normal termination.
                    tracing::info!("Server closed the session");
                    break;
                }
            },
            Some(err) = failure_rx.recv() => {
                tracing::error!("Audio stream failed, ending session: {}", err);
                let _ = ui_tx.send(UiEvent::Error(err.to_string())).await;
                break;
            }
            _ = tick.tick() => {
                scheduler.poll();
            }
            _ = stop_rx.changed() => {
                tracing::info!("Stop requested");
                break;
            }
        }

        // Mirror speaking transitions into the UI stream alongside
        // the watch channel, so one receiver suffices for a simple UI.
        let now_speaking = scheduler.is_speaking();
        if now_speaking != speaking {
            speaking = now_speaking;
            let _ = ui_tx.send(UiEvent::Speaking(speaking)).await;
        }
    }

    transport.close().await;

    if let Err(e) = state.transition(SessionState::Stopping) {
        tracing::warn!("Teardown transition skipped: {}", e);
    }
    if let Some(capture) = capture {
        capture.stop();
    }
    if let Some(output) = output {
        output.stop();
    }
    // Buffers already scheduled keep playing out on the device until
    // the output thread drops the stream; only the interruption path
    // cuts them short.
    if let Err(e) = state.transition(SessionState::Idle) {
        tracing::warn!("Teardown transition skipped: {}", e);
    }
}

/// Handle one inbound message. Each message may carry any subset of
/// {tool calls, inline audio, interruption flag}; they are handled in
/// that order, to completion, before the next message is seen.
pub async fn dispatch<T, O>(
    msg: &ServerMessage,
    scheduler: &mut PlaybackScheduler<O>,
    transport: &mut T,
    ui_tx: &mpsc::Sender<UiEvent>,
) -> Result<(), SessionError>
where
    T: SessionTransport,
    O: AudioOut,
{
    // Tool calls: forward to the UI, then acknowledge every call in
    // arrival order. The ack is mandatory even for calls we cannot
    // parse, or the remote side stalls the turn.
    if let Some(tool_call) = &msg.tool_call {
        for call in &tool_call.function_calls {
            if call.name == UPDATE_GAME_UI {
                match serde_json::from_value::<GameUpdate>(call.args.clone()) {
                    Ok(update) => {
                        if ui_tx.send(UiEvent::Game(update)).await.is_err() {
                            tracing::warn!("UI collaborator gone, dropping game update");
                        }
                    }
                    Err(e) => {
                        tracing::warn!("Malformed {} arguments: {}", call.name, e);
                    }
                }
            } else {
                tracing::warn!("Unexpected tool call: {}", call.name);
            }
            transport.send(ClientMessage::tool_ack(call)).await?;
        }
    }

    // Inline audio: a bad chunk is logged and dropped, never fatal.
    for blob in msg.audio_blobs() {
        let bytes = match pcm::decode_base64(&blob.data) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!("Dropping audio chunk with invalid base64: {}", e);
                continue;
            }
        };
        if let Err(e) = scheduler.decode_and_schedule(&bytes) {
            tracing::warn!("Dropping undecodable audio chunk: {}", e);
        }
    }

    if msg.is_interrupted() {
        tracing::debug!("Interruption: stopping agent speech");
        scheduler.interrupt();
    }

    Ok(())
}
