//! luxbot — spoken-dialogue client for a Furhat robot.
//!
//! Wires the configured ASR, LLM and TTS backends to the robot's realtime API and runs
//! the turn loop until Ctrl-C / SIGTERM or the robot disconnects. The session log is
//! written on the way out.

use anyhow::Context;
use clap::Parser;
use luxbot_core::{
    create_language_model, ClientConfig, FurhatClient, ListenOptions, LlmBackendKind,
    OrchestratorSettings, SessionLogger, TurnOrchestrator,
};
use luxbot_voice::{
    create_recognizer, local_ip, serve_audio_dir, AsrMode, CaptureBuffer, LocalTts,
    MicrophoneInput, RemoteTts, SpeechSynthesizer, TtsMode, VoiceRegistry,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "luxbot")]
#[command(about = "Spoken-dialogue client for the Furhat robot", long_about = None)]
struct Cli {
    /// Robot address
    #[arg(long)]
    host: Option<String>,

    /// Robot realtime API port
    #[arg(long)]
    port: Option<u16>,

    /// ASR backend: furhat, whisper or luxasr
    #[arg(long, value_parser = parse_asr)]
    asr: Option<AsrMode>,

    /// Shorthand for --asr whisper
    #[arg(long, conflicts_with_all = ["asr", "luxasr", "furhat"])]
    whisper: bool,

    /// Shorthand for --asr luxasr
    #[arg(long, conflicts_with_all = ["asr", "whisper", "furhat"])]
    luxasr: bool,

    /// Shorthand for --asr furhat
    #[arg(long, conflicts_with_all = ["asr", "whisper", "luxasr"])]
    furhat: bool,

    /// LLM backend: openai or luxllama
    #[arg(long, value_parser = parse_llm)]
    llm: Option<LlmBackendKind>,
}

fn parse_asr(s: &str) -> Result<AsrMode, String> {
    s.parse().map_err(|e: luxbot_voice::VoiceError| e.to_string())
}

fn parse_llm(s: &str) -> Result<LlmBackendKind, String> {
    s.parse().map_err(|e: luxbot_core::CoreError| e.to_string())
}

impl Cli {
    fn asr_mode(&self) -> Option<AsrMode> {
        if self.whisper {
            Some(AsrMode::Whisper)
        } else if self.luxasr {
            Some(AsrMode::LuxAsr)
        } else if self.furhat {
            Some(AsrMode::Furhat)
        } else {
            self.asr
        }
    }

    fn apply(&self, config: &mut ClientConfig) {
        if let Some(host) = &self.host {
            config.robot.host = host.clone();
        }
        if let Some(port) = self.port {
            config.robot.port = port;
        }
        if let Some(mode) = self.asr_mode() {
            config.asr_mode = mode;
        }
        if let Some(llm) = self.llm {
            config.llm.backend = llm;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("[luxbot] .env not loaded: {} (using system environment)", e);
    }

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let mut config = ClientConfig::load().context("load client config")?;
    cli.apply(&mut config);
    config.validate()?;

    tracing::info!(
        participant = %config.participant_id,
        task = %config.task_id,
        asr = %config.asr_mode,
        llm = %config.llm.backend,
        "🚀 luxbot starting"
    );

    // External microphone only for the remote recognizers.
    let (capture, _mic_stream) = if config.asr_mode.uses_microphone() {
        tracing::info!("[Mic] External microphone ENABLED for {} ASR", config.asr_mode);
        let buffer = Arc::new(CaptureBuffer::new(config.capture.clone()));
        let stream = MicrophoneInput::new(config.capture.clone())?.start(Arc::clone(&buffer))?;
        (Some(buffer), Some(stream))
    } else {
        tracing::info!("[Mic] External microphone DISABLED (using robot ASR)");
        (None, None)
    };

    let asr = create_recognizer(config.asr_mode, &config.asr, capture)?;
    let llm = create_language_model(&config.llm)?;
    let tts = build_tts(&config).await?;

    let (robot, events) = FurhatClient::connect(
        &config.robot.host,
        config.robot.port,
        config.robot.auth_key.as_deref(),
    )
    .await?;

    let cancel = CancellationToken::new();
    tokio::spawn(watch_signals(cancel.clone()));

    let mut orchestrator = TurnOrchestrator::new(
        OrchestratorSettings {
            participant_id: config.participant_id.clone(),
            task_id: config.task_id.clone(),
            history_window: config.history_window,
            greeting: Some(config.robot.greeting.clone()).filter(|g| !g.trim().is_empty()),
            listen: ListenOptions {
                end_speech_timeout: config.robot.end_speech_timeout,
                ..Default::default()
            },
        },
        Arc::new(robot),
        asr,
        llm,
        tts,
        SessionLogger::new(&config.log_dir),
        cancel,
    );

    match orchestrator.run(events).await? {
        Some(path) => tracing::info!("Session log: {}", path.display()),
        None => tracing::warn!("No session log written"),
    }
    Ok(())
}

/// Local Piper voices plus the companion file server, or the remote TTS service.
async fn build_tts(config: &ClientConfig) -> anyhow::Result<Arc<dyn SpeechSynthesizer>> {
    let tts = &config.tts;
    match tts.mode {
        TtsMode::Remote => {
            tracing::info!("🔊 TTS: remote service at {}", tts.remote_url);
            Ok(Arc::new(RemoteTts::new(tts.remote_url.clone())))
        }
        TtsMode::Local => {
            let registry = VoiceRegistry::from_piper(&tts.piper_binary, &tts.voices)
                .context("load Piper voices")?;
            tracing::info!("🔊 TTS: local Piper voices {:?}", registry.languages());

            let addr = SocketAddr::from(([0, 0, 0, 0], tts.file_port));
            let dir = tts.audio_dir.clone();
            tokio::spawn(async move {
                if let Err(e) = serve_audio_dir(addr, dir).await {
                    tracing::error!("Audio file server stopped: {}", e);
                }
            });

            let base_url = tts
                .public_base_url
                .clone()
                .unwrap_or_else(|| format!("http://{}:{}", local_ip(), tts.file_port));
            Ok(Arc::new(LocalTts::new(registry, tts.audio_dir.clone(), base_url, "audio")))
        }
    }
}

/// Ctrl-C, or SIGTERM on Unix, cancels the turn loop.
async fn watch_signals(cancel: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => tracing::info!("CTRL-C received"),
                    _ = term.recv() => tracing::info!("SIGTERM received"),
                }
            }
            Err(e) => {
                tracing::warn!("SIGTERM handler unavailable: {}", e);
                let _ = tokio::signal::ctrl_c().await;
                tracing::info!("CTRL-C received");
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("CTRL-C received");
    }
    cancel.cancel();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shorthand_flags_pick_asr_mode() {
        let cli = Cli::parse_from(["luxbot", "--luxasr", "--llm", "luxllama", "--host", "10.0.0.9"]);
        let mut config = ClientConfig::default();
        cli.apply(&mut config);
        assert_eq!(config.asr_mode, AsrMode::LuxAsr);
        assert_eq!(config.llm.backend, LlmBackendKind::LuxLlama);
        assert_eq!(config.robot.host, "10.0.0.9");
        assert_eq!(config.robot.port, 9000);
    }

    #[test]
    fn defaults_leave_config_untouched() {
        let cli = Cli::parse_from(["luxbot"]);
        let mut config = ClientConfig::default();
        cli.apply(&mut config);
        assert_eq!(config.asr_mode, AsrMode::Furhat);
        assert_eq!(config.llm.backend, LlmBackendKind::OpenAi);
    }

    #[test]
    fn unknown_backends_are_rejected() {
        assert!(Cli::try_parse_from(["luxbot", "--asr", "google"]).is_err());
        assert!(Cli::try_parse_from(["luxbot", "--llm", "claude"]).is_err());
        assert!(Cli::try_parse_from(["luxbot", "--whisper", "--luxasr"]).is_err());
    }
}
