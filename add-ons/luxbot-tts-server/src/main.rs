//! luxbot TTS server — renders `"<lang>:<text>"` with local Piper voices.
//!
//! `POST /tts {text}` → `{url}`; the WAV is then fetchable under `/static/audio/<file>`
//! (and `/audio/<file>`). Default port 9000.

use anyhow::Context;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use clap::Parser;
use luxbot_voice::{audio_routes, local_ip, LocalTts, SpeechSynthesizer, TtsSettings, VoiceRegistry};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "luxbot-tts-server")]
#[command(about = "Companion TTS service for the luxbot client", long_about = None)]
struct Cli {
    /// Listen port (overrides config)
    #[arg(long)]
    port: Option<u16>,

    /// Config file (TOML)
    #[arg(long, env = "LUXBOT_TTS_CONFIG", default_value = "config/luxbot-tts.toml")]
    config: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
struct ServerConfig {
    port: u16,
    tts: TtsSettings,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 9000,
            tts: TtsSettings {
                audio_dir: PathBuf::from("static/audio"),
                ..Default::default()
            },
        }
    }
}

impl ServerConfig {
    /// Defaults, optional TOML file, then `LUXBOT_*` environment.
    fn load(path: &Path) -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder();
        let builder = if path.exists() {
            builder.add_source(config::File::from(path))
        } else {
            builder
        };
        let built = builder
            .add_source(
                config::Environment::with_prefix("LUXBOT")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;
        let mut cfg: Self = built.try_deserialize()?;
        if cfg.tts.audio_dir.as_os_str().is_empty() {
            cfg.tts.audio_dir = Self::default().tts.audio_dir;
        }
        Ok(cfg)
    }
}

#[derive(Clone)]
struct AppState {
    tts: Arc<dyn SpeechSynthesizer>,
}

#[derive(Deserialize)]
struct TtsBody {
    #[serde(default)]
    text: String,
}

fn app(tts: Arc<dyn SpeechSynthesizer>, audio_dir: PathBuf) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/tts", post(tts_handler))
        .with_state(AppState { tts })
        .merge(audio_routes(audio_dir))
}

async fn index() -> &'static str {
    "Hello from the luxbot TTS server!"
}

async fn tts_handler(State(state): State<AppState>, Json(body): Json<TtsBody>) -> Response {
    let text = body.text.trim();
    if text.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Missing 'text' in request" })),
        )
            .into_response();
    }

    match state.tts.synthesize(text).await {
        Ok(url) => {
            tracing::info!("🗣️ {} → {}", text, url);
            Json(json!({ "url": url })).into_response()
        }
        Err(e) => {
            tracing::error!("TTS failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            )
                .into_response()
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("[luxbot-tts-server] .env not loaded: {} (using system environment)", e);
    }

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let mut config = ServerConfig::load(&cli.config).context("load TTS server config")?;
    if let Some(port) = cli.port {
        config.port = port;
    }

    let registry = VoiceRegistry::from_piper(&config.tts.piper_binary, &config.tts.voices)
        .context("load Piper voices")?;
    tracing::info!("✅ Voices loaded: {:?}", registry.languages());

    tokio::fs::create_dir_all(&config.tts.audio_dir).await?;
    let base_url = config
        .tts
        .public_base_url
        .clone()
        .unwrap_or_else(|| format!("http://{}:{}", local_ip(), config.port));
    let tts = Arc::new(LocalTts::new(
        registry,
        config.tts.audio_dir.clone(),
        base_url,
        "static/audio",
    ));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("bind {}", addr))?;
    tracing::info!("🚀 TTS server listening on http://{}", addr);

    axum::serve(listener, app(tts, config.tts.audio_dir.clone()))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("CTRL-C received; shutting down TTS server");
        })
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use luxbot_voice::VoiceResult;

    struct EchoTts;

    #[async_trait]
    impl SpeechSynthesizer for EchoTts {
        async fn synthesize(&self, tagged_text: &str) -> VoiceResult<String> {
            Ok(format!("http://tts.local/static/audio/{}.wav", tagged_text.replace(':', "_")))
        }
    }

    async fn spawn(dir: PathBuf) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app(Arc::new(EchoTts), dir)).await.unwrap();
        });
        addr
    }

    #[tokio::test]
    async fn tts_returns_url() {
        let dir = tempfile::tempdir().unwrap();
        let addr = spawn(dir.path().to_path_buf()).await;

        let res = reqwest::Client::new()
            .post(format!("http://{}/tts", addr))
            .json(&json!({ "text": " lb:Moien " }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), 200);
        let body: serde_json::Value = res.json().await.unwrap();
        assert_eq!(body["url"], "http://tts.local/static/audio/lb_Moien.wav");
    }

    #[tokio::test]
    async fn missing_text_is_bad_request() {
        let dir = tempfile::tempdir().unwrap();
        let addr = spawn(dir.path().to_path_buf()).await;

        for body in [json!({}), json!({ "text": "   " })] {
            let res = reqwest::Client::new()
                .post(format!("http://{}/tts", addr))
                .json(&body)
                .send()
                .await
                .unwrap();
            assert_eq!(res.status(), 400);
        }
    }

    #[tokio::test]
    async fn serves_generated_files_and_index() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("abc.wav"), b"RIFF").unwrap();
        let addr = spawn(dir.path().to_path_buf()).await;

        let file = reqwest::get(format!("http://{}/static/audio/abc.wav", addr))
            .await
            .unwrap();
        assert_eq!(file.status(), 200);

        let index = reqwest::get(format!("http://{}/", addr)).await.unwrap();
        assert_eq!(index.text().await.unwrap(), "Hello from the luxbot TTS server!");
    }

    #[test]
    fn default_config_uses_static_dir_and_port_9000() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.port, 9000);
        assert_eq!(cfg.tts.audio_dir, PathBuf::from("static/audio"));
    }
}
