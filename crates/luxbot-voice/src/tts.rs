//! **TTS** — language-tagged text in, playable audio URL out.
//!
//! Input looks like `"lb:Moien, wéi geet et?"`. The prefix before the first colon picks
//! the voice; untagged text and unknown languages use the English voice. [`LocalTts`]
//! renders through Piper and writes a uniquely named WAV into the served audio dir;
//! [`RemoteTts`] delegates to the companion `/tts` service.

use crate::error::{VoiceError, VoiceResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

/// Language used when the text carries no prefix or names an unregistered voice.
pub const DEFAULT_LANGUAGE: &str = "en";

/// Split `"<lang>:<text>"` on the first colon. Text without a colon is English.
pub fn split_language_tag(tagged: &str) -> (String, String) {
    match tagged.split_once(':') {
        Some((lang, content)) => (lang.trim().to_string(), content.trim().to_string()),
        None => (DEFAULT_LANGUAGE.to_string(), tagged.trim().to_string()),
    }
}

/// One synthesis voice producing mono 16-bit PCM at its native rate.
#[async_trait]
pub trait VoiceModel: Send + Sync {
    fn sample_rate(&self) -> u32;

    async fn render(&self, text: &str) -> VoiceResult<Vec<i16>>;
}

#[derive(Deserialize)]
struct PiperModelConfig {
    audio: PiperAudioConfig,
}

#[derive(Deserialize)]
struct PiperAudioConfig {
    sample_rate: u32,
}

/// Piper voice driven through the `piper` executable (`--output_raw` to stdout).
#[derive(Debug, Clone)]
pub struct PiperVoice {
    binary: PathBuf,
    model: PathBuf,
    sample_rate: u32,
}

impl PiperVoice {
    /// Load a voice; the native rate comes from the `<model>.json` sidecar Piper ships.
    pub fn load(binary: impl Into<PathBuf>, model: impl Into<PathBuf>) -> VoiceResult<Self> {
        let model = model.into();
        let mut sidecar = model.clone().into_os_string();
        sidecar.push(".json");
        let sidecar = PathBuf::from(sidecar);

        let raw = std::fs::read_to_string(&sidecar).map_err(|e| {
            VoiceError::Config(format!("cannot read voice config {}: {}", sidecar.display(), e))
        })?;
        let parsed: PiperModelConfig = serde_json::from_str(&raw).map_err(|e| {
            VoiceError::Config(format!("invalid voice config {}: {}", sidecar.display(), e))
        })?;

        Ok(Self {
            binary: binary.into(),
            model,
            sample_rate: parsed.audio.sample_rate,
        })
    }

    pub fn model(&self) -> &Path {
        &self.model
    }
}

#[async_trait]
impl VoiceModel for PiperVoice {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    async fn render(&self, text: &str) -> VoiceResult<Vec<i16>> {
        let mut child = tokio::process::Command::new(&self.binary)
            .arg("--model")
            .arg(&self.model)
            .arg("--output_raw")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| VoiceError::Tts(format!("failed to start piper: {}", e)))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(text.as_bytes()).await?;
            stdin.write_all(b"\n").await?;
        }

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            return Err(VoiceError::Tts(format!("piper exited with {}", output.status)));
        }

        Ok(output
            .stdout
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]))
            .collect())
    }
}

/// Language code → voice. English must be present; it is the fallback.
pub struct VoiceRegistry {
    voices: HashMap<String, Arc<dyn VoiceModel>>,
    fallback: Arc<dyn VoiceModel>,
}

impl VoiceRegistry {
    pub fn new(voices: HashMap<String, Arc<dyn VoiceModel>>) -> VoiceResult<Self> {
        let fallback = voices
            .get(DEFAULT_LANGUAGE)
            .cloned()
            .ok_or_else(|| VoiceError::UnknownVoice(DEFAULT_LANGUAGE.to_string()))?;
        Ok(Self { voices, fallback })
    }

    /// Load every configured Piper model.
    pub fn from_piper(binary: &Path, models: &HashMap<String, PathBuf>) -> VoiceResult<Self> {
        let mut voices: HashMap<String, Arc<dyn VoiceModel>> = HashMap::new();
        for (lang, model) in models {
            info!("🔊 Loading voice '{}' from {}", lang, model.display());
            voices.insert(lang.clone(), Arc::new(PiperVoice::load(binary, model)?));
        }
        Self::new(voices)
    }

    /// Voice for `lang`, falling back to English. Returns the language actually used.
    pub fn select(&self, lang: &str) -> (&str, &Arc<dyn VoiceModel>) {
        match self.voices.get_key_value(lang) {
            Some((key, voice)) => (key.as_str(), voice),
            None => {
                debug!("No voice for '{}', using {}", lang, DEFAULT_LANGUAGE);
                (DEFAULT_LANGUAGE, &self.fallback)
            }
        }
    }

    pub fn languages(&self) -> Vec<&str> {
        let mut langs: Vec<&str> = self.voices.keys().map(String::as_str).collect();
        langs.sort_unstable();
        langs
    }
}

/// Backend that turns language-tagged text into a URL the robot can fetch.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, tagged_text: &str) -> VoiceResult<String>;
}

/// Renders locally and publishes the file through the audio routes.
pub struct LocalTts {
    registry: VoiceRegistry,
    audio_dir: PathBuf,
    base_url: String,
    url_prefix: String,
}

impl LocalTts {
    /// `base_url` is how the robot reaches the file server (e.g. `http://10.0.0.5:8080`);
    /// `url_prefix` is the route the files are served under (`audio` or `static/audio`).
    pub fn new(
        registry: VoiceRegistry,
        audio_dir: impl Into<PathBuf>,
        base_url: impl Into<String>,
        url_prefix: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            audio_dir: audio_dir.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            url_prefix: url_prefix.into().trim_matches('/').to_string(),
        }
    }

    pub fn audio_dir(&self) -> &Path {
        &self.audio_dir
    }

    /// Render and write a new `<uuid>.wav`; returns the file path.
    pub async fn synthesize_to_file(&self, tagged_text: &str) -> VoiceResult<PathBuf> {
        let (lang, content) = split_language_tag(tagged_text);
        let (used, voice) = self.registry.select(&lang);
        let samples = voice.render(&content).await?;

        tokio::fs::create_dir_all(&self.audio_dir).await?;
        let path = self.audio_dir.join(format!("{}.wav", uuid::Uuid::new_v4()));
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: voice.sample_rate(),
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec)?;
        for s in &samples {
            writer.write_sample(*s)?;
        }
        writer.finalize()?;

        info!(
            "🗣️ Synthesized {} samples with '{}' voice → {}",
            samples.len(),
            used,
            path.display()
        );
        Ok(path)
    }

    pub fn url_for(&self, path: &Path) -> VoiceResult<String> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| VoiceError::Tts(format!("bad output path {}", path.display())))?;
        Ok(format!("{}/{}/{}", self.base_url, self.url_prefix, name))
    }
}

#[async_trait]
impl SpeechSynthesizer for LocalTts {
    async fn synthesize(&self, tagged_text: &str) -> VoiceResult<String> {
        let path = self.synthesize_to_file(tagged_text).await?;
        self.url_for(&path)
    }
}

#[derive(Serialize)]
struct TtsRequest<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct TtsResponse {
    url: String,
}

/// Delegates to the companion TTS service (`POST /tts {text}` → `{url}`).
pub struct RemoteTts {
    endpoint: String,
    client: reqwest::Client,
}

impl RemoteTts {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl SpeechSynthesizer for RemoteTts {
    async fn synthesize(&self, tagged_text: &str) -> VoiceResult<String> {
        let res = self
            .client
            .post(&self.endpoint)
            .json(&TtsRequest { text: tagged_text })
            .send()
            .await
            .map_err(|e| VoiceError::Tts(format!("TTS request failed: {}", e)))?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            warn!("[TTS] Server error {}: {}", status, body);
            return Err(VoiceError::Tts(format!("TTS server returned {}", status)));
        }

        let body: TtsResponse = res
            .json()
            .await
            .map_err(|e| VoiceError::Tts(format!("malformed TTS response: {}", e)))?;
        Ok(body.url)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TtsMode {
    #[default]
    Local,
    Remote,
}

/// TTS configuration shared by the client and the companion server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TtsSettings {
    pub mode: TtsMode,
    /// Companion service endpoint for [`TtsMode::Remote`].
    pub remote_url: String,
    pub piper_binary: PathBuf,
    /// Language code → Piper `.onnx` model.
    pub voices: HashMap<String, PathBuf>,
    pub audio_dir: PathBuf,
    /// Port the synthesized files are served on.
    pub file_port: u16,
    /// Public base URL for served files; derived from the LAN address when unset.
    pub public_base_url: Option<String>,
}

impl Default for TtsSettings {
    fn default() -> Self {
        let mut voices = HashMap::new();
        voices.insert(
            "en".to_string(),
            PathBuf::from("models/piper/en_US_lessac/en_US-lessac-medium.onnx"),
        );
        voices.insert(
            "lb".to_string(),
            PathBuf::from("models/piper/lb_LU/lb_LU-marylux-medium.onnx"),
        );
        Self {
            mode: TtsMode::Local,
            remote_url: "http://127.0.0.1:9000/tts".to_string(),
            piper_binary: PathBuf::from("piper"),
            voices,
            audio_dir: PathBuf::from("temp_audio"),
            file_port: 8080,
            public_base_url: None,
        }
    }
}
