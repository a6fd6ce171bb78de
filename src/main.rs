use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};

use moodchat_core::ChatBackend;
use moodchat_engine::SessionStore;
use moodchat_llm::{GeminiBackend, GeminiConfig, GuardedBackend, UnavailableBackend};
use moodchat_server::{load_settings_from_path, settings_path, CompanionSettings, HandlerState};
use moodchat_telemetry::{init_telemetry, LogFormat, TelemetryConfig};
use moodchat_vision::onnx::{OnnxEmotionClassifier, OnnxFaceLocator};
use moodchat_vision::FramePipeline;

/// Emotion-aware chat companion server.
#[derive(Debug, Parser)]
#[command(name = "moodchat", version, about)]
struct Cli {
    /// Settings file (defaults to ~/.moodchat/settings.json).
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    port: Option<u16>,

    #[arg(long)]
    host: Option<String>,

    /// `json` or `pretty`.
    #[arg(long, default_value = "json")]
    log_format: LogFormat,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let path = cli.config.clone().unwrap_or_else(settings_path);
    let mut settings = load_settings_from_path(&path)
        .with_context(|| format!("loading settings from {}", path.display()))?;
    if let Some(port) = cli.port {
        settings.server.port = port;
    }
    if let Some(host) = cli.host {
        settings.server.host = host;
    }
    settings.validate()?;

    let telemetry = init_telemetry(TelemetryConfig {
        log_level: settings.log_level()?,
        format: cli.log_format,
        ..TelemetryConfig::default()
    });

    // Model load failure is fatal before binding.
    let pipeline = load_pipeline(&settings).await?;
    let backend = select_backend(&settings)?;
    let sessions = Arc::new(SessionStore::new(settings.session_config())?);

    let state = HandlerState::new(sessions, backend, pipeline, telemetry.metrics_handle());
    let handle = moodchat_server::start(settings.server_config(), state)
        .await
        .with_context(|| format!("binding {}:{}", settings.server.host, settings.server.port))?;
    info!(host = %settings.server.host, port = handle.port, "moodchat ready");

    tokio::signal::ctrl_c()
        .await
        .context("listening for ctrl-c")?;
    info!("shutting down");
    handle.shutdown().await;
    Ok(())
}

async fn load_pipeline(settings: &CompanionSettings) -> anyhow::Result<FramePipeline> {
    let vision = &settings.vision;
    let locator = OnnxFaceLocator::load(vision.face_model_path.clone(), vision.intra_threads)
        .await
        .context("loading face detector")?;
    let classifier = OnnxEmotionClassifier::load(vision.emotion_model_path.clone(), vision.intra_threads)
        .await
        .context("loading emotion classifier")?;
    Ok(FramePipeline::new(locator, classifier, settings.detector_params()))
}

fn select_backend(settings: &CompanionSettings) -> anyhow::Result<Arc<dyn ChatBackend>> {
    let Some(config) = GeminiConfig::from_env(settings.backend.model.clone()) else {
        warn!(
            env = moodchat_llm::gemini::API_KEY_ENV,
            "no API key configured, every chat reply will be a fallback"
        );
        return Ok(Arc::new(UnavailableBackend::new("no API key configured")));
    };
    let gemini = GeminiBackend::new(config.with_base_url(settings.backend.base_url.clone()))?;
    info!(model = %settings.backend.model, "using Gemini backend");
    Ok(Arc::new(GuardedBackend::new(gemini, settings.guard_config())))
}
