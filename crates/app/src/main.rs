mod personas;
mod ui;

use anyhow::anyhow;
use clap::{Parser, ValueEnum};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::writer::MakeWriterExt;

use voxtutor_audio::ResamplerQuality;
use voxtutor_foundation::ShutdownHandler;
use voxtutor_session::{Session, SessionConfig, StartOptions, UiEvent};

#[derive(Parser, Debug)]
#[command(name = "voxtutor", about = "Realtime voice reading tutor")]
struct Cli {
    /// API key for the realtime endpoint.
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    api_key: String,

    /// Input device name; the system default when omitted.
    #[arg(long)]
    device: Option<String>,

    /// Tutor persona preset.
    #[arg(long, default_value = "orion")]
    persona: String,

    /// Override the default model.
    #[arg(long)]
    model: Option<String>,

    /// Microphone resampler quality.
    #[arg(long, value_enum, default_value_t = Quality::Balanced)]
    quality: Quality,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Quality {
    Fast,
    Balanced,
    Quality,
}

impl From<Quality> for ResamplerQuality {
    fn from(q: Quality) -> Self {
        match q {
            Quality::Fast => ResamplerQuality::Fast,
            Quality::Balanced => ResamplerQuality::Balanced,
            Quality::Quality => ResamplerQuality::Quality,
        }
    }
}

fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    std::fs::create_dir_all("logs")?;
    let file_appender = RollingFileAppender::new(Rotation::DAILY, "logs", "voxtutor.log");
    let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_writer(std::io::stdout.and(non_blocking_file))
        .with_env_filter(log_level)
        .init();
    std::mem::forget(guard);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging()?;
    let cli = Cli::parse();

    let persona = personas::by_name(&cli.persona).ok_or_else(|| {
        anyhow!(
            "unknown persona {:?}; available: {}",
            cli.persona,
            personas::available().join(", ")
        )
    })?;
    tracing::info!("Starting VoxTutor with persona {:?}", persona.name);

    let mut cfg = SessionConfig::new(persona);
    if let Some(model) = cli.model {
        cfg = cfg.with_model(model);
    }

    let shutdown = ShutdownHandler::new().install();

    let mut session = Session::new(
        cfg,
        StartOptions {
            api_key: cli.api_key,
            input_device: cli.device,
            resampler_quality: cli.quality.into(),
        },
    );
    let mut handle = session
        .start()
        .await?
        .ok_or_else(|| anyhow!("a session is already active"))?;
    tracing::info!("Session active. Speak into the microphone; Ctrl-C to stop.");

    loop {
        tokio::select! {
            _ = shutdown.wait() => {
                tracing::info!("Shutdown signal received");
                break;
            }
            event = handle.ui_rx.recv() => match event {
                Some(UiEvent::Game(update)) => ui::render_game(&update),
                Some(UiEvent::Speaking(speaking)) => ui::render_speaking(speaking),
                Some(UiEvent::Error(msg)) => {
                    tracing::error!("Session failed: {}", msg);
                    break;
                }
                None => {
                    tracing::info!("Session ended by the server");
                    break;
                }
            },
        }
    }

    session.stop().await;
    tracing::info!("VoxTutor stopped");
    Ok(())
}
