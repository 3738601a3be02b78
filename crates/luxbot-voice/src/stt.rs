//! **Speech-to-Text (ASR)** — turn a finished user utterance into text.
//!
//! Three interchangeable strategies sit behind [`SpeechRecognizer`]:
//! - [`PlatformAsr`]: the robot already transcribed; the text arrives on the hear-end event.
//! - [`WhisperServerAsr`]: upload the captured WAV to a general-purpose transcription server.
//! - [`LuxAsr`]: upload to the Luxembourgish diarizing service and strip speaker prefixes.
//!
//! Transport hiccups never end the conversation: non-200 responses and malformed bodies
//! come back as an empty [`Transcript`], which the turn loop reads as "no speech".

use crate::capture::CaptureBuffer;
use crate::error::{VoiceError, VoiceResult};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, warn};

/// Default diarization-enabled LuxASR endpoint.
pub const DEFAULT_LUXASR_URL: &str = "https://luxasr.uni.lu/v2/asr";

static DIARIZATION_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*\[[^\]\n]*\]\s*SPEAKER_\d+:\s*").expect("valid diarization regex"));

/// Which recognizer the client runs with. Unknown names are rejected when parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AsrMode {
    /// Robot platform's own ASR (text on the hear-end event).
    #[default]
    Furhat,
    /// Remote general-purpose Whisper server.
    Whisper,
    /// Remote Luxembourgish LuxASR service.
    LuxAsr,
}

impl AsrMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AsrMode::Furhat => "furhat",
            AsrMode::Whisper => "whisper",
            AsrMode::LuxAsr => "luxasr",
        }
    }

    /// Remote modes record locally and need the external microphone.
    pub fn uses_microphone(&self) -> bool {
        !matches!(self, AsrMode::Furhat)
    }
}

impl fmt::Display for AsrMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AsrMode {
    type Err = VoiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "furhat" | "platform" | "native" => Ok(AsrMode::Furhat),
            "whisper" => Ok(AsrMode::Whisper),
            "luxasr" => Ok(AsrMode::LuxAsr),
            other => Err(VoiceError::Config(format!(
                "unknown ASR mode '{}' (expected furhat, whisper or luxasr)",
                other
            ))),
        }
    }
}

/// Endpoints and storage for the remote recognizers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AsrSettings {
    /// Whisper server transcription endpoint (multipart field `audio`, JSON `{text}` back).
    pub whisper_url: String,
    /// LuxASR endpoint (multipart field `audio_file`, plain-text diarized transcript back).
    pub luxasr_url: String,
    /// Where recorded user utterances are written.
    pub audio_dir: PathBuf,
}

impl Default for AsrSettings {
    fn default() -> Self {
        Self {
            whisper_url: "http://127.0.0.1:9000/transcribe".to_string(),
            luxasr_url: DEFAULT_LUXASR_URL.to_string(),
            audio_dir: PathBuf::from("temp_audio"),
        }
    }
}

/// Payload of the robot's hear-end event.
#[derive(Debug, Clone, Default)]
pub struct HeardUtterance {
    /// Platform transcript (may be empty when the platform ASR is not used).
    pub text: String,
}

impl HeardUtterance {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// Recognized text plus the recorded utterance, when one was recorded.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Transcript {
    pub text: String,
    pub audio_path: Option<PathBuf>,
}

impl Transcript {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Empty or whitespace-only text means there is nothing to respond to.
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Backend that turns one utterance into text.
#[async_trait]
pub trait SpeechRecognizer: Send + Sync {
    fn mode(&self) -> AsrMode;

    /// Robot reported listen-start. Remote recognizers begin recording here.
    fn begin_capture(&self) {}

    /// Transcribe the utterance that just ended.
    async fn transcribe(&self, heard: &HeardUtterance) -> VoiceResult<Transcript>;
}

/// Remove `[start-end] SPEAKER_n:` diarization prefixes from a LuxASR transcript.
pub fn strip_diarization(text: &str) -> String {
    DIARIZATION_PREFIX.replace_all(text, "").trim().to_string()
}

/// Platform-native ASR: the text is already on the event.
#[derive(Debug, Default)]
pub struct PlatformAsr;

#[async_trait]
impl SpeechRecognizer for PlatformAsr {
    fn mode(&self) -> AsrMode {
        AsrMode::Furhat
    }

    async fn transcribe(&self, heard: &HeardUtterance) -> VoiceResult<Transcript> {
        Ok(Transcript {
            text: heard.text.trim().to_string(),
            audio_path: None,
        })
    }
}

/// Stop the capture buffer and write the utterance under a fresh `user_<uuid>.wav` name.
fn record_utterance(capture: &CaptureBuffer, audio_dir: &Path) -> VoiceResult<Option<PathBuf>> {
    let path = audio_dir.join(format!("user_{}.wav", uuid::Uuid::new_v4()));
    capture.stop_and_save(&path)
}

/// Build a multipart form holding the WAV file under `field`.
async fn wav_form(path: &Path, field: &'static str) -> VoiceResult<reqwest::multipart::Form> {
    let bytes = tokio::fs::read(path).await?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "audio.wav".to_string());
    let part = reqwest::multipart::Part::bytes(bytes)
        .file_name(file_name)
        .mime_str("audio/wav")?;
    Ok(reqwest::multipart::Form::new().part(field, part))
}

fn http_client() -> VoiceResult<reqwest::Client> {
    reqwest::Client::builder()
        .build()
        .map_err(|e| VoiceError::Asr(e.to_string()))
}

/// General-purpose Whisper transcription server.
pub struct WhisperServerAsr {
    endpoint: String,
    audio_dir: PathBuf,
    capture: Arc<CaptureBuffer>,
    client: reqwest::Client,
}

impl WhisperServerAsr {
    pub fn new(
        endpoint: impl Into<String>,
        audio_dir: impl Into<PathBuf>,
        capture: Arc<CaptureBuffer>,
    ) -> VoiceResult<Self> {
        Ok(Self {
            endpoint: endpoint.into(),
            audio_dir: audio_dir.into(),
            capture,
            client: http_client()?,
        })
    }
}

#[derive(Deserialize)]
struct WhisperResponse {
    #[serde(default)]
    text: String,
}

#[async_trait]
impl SpeechRecognizer for WhisperServerAsr {
    fn mode(&self) -> AsrMode {
        AsrMode::Whisper
    }

    fn begin_capture(&self) {
        self.capture.start_capture();
    }

    async fn transcribe(&self, _heard: &HeardUtterance) -> VoiceResult<Transcript> {
        let Some(path) = record_utterance(&self.capture, &self.audio_dir)? else {
            debug!("Whisper: no frames captured");
            return Ok(Transcript::empty());
        };

        let form = wav_form(&path, "audio").await?;
        let res = self
            .client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(|e| VoiceError::Asr(format!("Whisper request failed: {}", e)))?;

        if !res.status().is_success() {
            warn!("[Whisper] Server error: {}", res.status());
            return Ok(Transcript::empty());
        }

        let text = match res.json::<WhisperResponse>().await {
            Ok(body) => body.text.trim().to_string(),
            Err(e) => {
                warn!("[Whisper] Malformed response: {}", e);
                return Ok(Transcript::empty());
            }
        };
        Ok(Transcript {
            text,
            audio_path: Some(path),
        })
    }
}

/// LuxASR: same upload flow, diarized plain-text response.
pub struct LuxAsr {
    endpoint: String,
    audio_dir: PathBuf,
    capture: Arc<CaptureBuffer>,
    client: reqwest::Client,
}

impl LuxAsr {
    pub fn new(
        endpoint: impl Into<String>,
        audio_dir: impl Into<PathBuf>,
        capture: Arc<CaptureBuffer>,
    ) -> VoiceResult<Self> {
        Ok(Self {
            endpoint: endpoint.into(),
            audio_dir: audio_dir.into(),
            capture,
            client: http_client()?,
        })
    }
}

#[async_trait]
impl SpeechRecognizer for LuxAsr {
    fn mode(&self) -> AsrMode {
        AsrMode::LuxAsr
    }

    fn begin_capture(&self) {
        self.capture.start_capture();
    }

    async fn transcribe(&self, _heard: &HeardUtterance) -> VoiceResult<Transcript> {
        let Some(path) = record_utterance(&self.capture, &self.audio_dir)? else {
            debug!("LuxASR: no frames captured");
            return Ok(Transcript::empty());
        };

        let form = wav_form(&path, "audio_file").await?;
        let res = self
            .client
            .post(&self.endpoint)
            .query(&[("diarization", "Enabled"), ("outfmt", "text")])
            .header("accept", "application/json")
            .multipart(form)
            .send()
            .await
            .map_err(|e| VoiceError::Asr(format!("LuxASR request failed: {}", e)))?;

        if !res.status().is_success() {
            warn!("[LuxASR] Server error: {}", res.status());
            return Ok(Transcript::empty());
        }

        let body = res
            .text()
            .await
            .map_err(|e| VoiceError::Asr(format!("LuxASR body read failed: {}", e)))?;
        Ok(Transcript {
            text: strip_diarization(&body),
            audio_path: Some(path),
        })
    }
}

/// Build the recognizer for `mode`. Remote modes require the capture buffer.
pub fn create_recognizer(
    mode: AsrMode,
    settings: &AsrSettings,
    capture: Option<Arc<CaptureBuffer>>,
) -> VoiceResult<Arc<dyn SpeechRecognizer>> {
    let need_capture = || {
        capture.clone().ok_or_else(|| {
            VoiceError::Config(format!("ASR mode '{}' needs the external microphone", mode))
        })
    };
    Ok(match mode {
        AsrMode::Furhat => Arc::new(PlatformAsr),
        AsrMode::Whisper => Arc::new(WhisperServerAsr::new(
            settings.whisper_url.clone(),
            settings.audio_dir.clone(),
            need_capture()?,
        )?),
        AsrMode::LuxAsr => Arc::new(LuxAsr::new(
            settings.luxasr_url.clone(),
            settings.audio_dir.clone(),
            need_capture()?,
        )?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::CaptureSettings;

    #[test]
    fn strips_single_speaker_prefix() {
        assert_eq!(strip_diarization("[0.00-1.10] SPEAKER_0: Hallo do"), "Hallo do");
    }

    #[test]
    fn strips_prefix_on_every_line() {
        let raw = "[0.00-1.20] SPEAKER_0: Moien\n[1.20-2.00] SPEAKER_1: wéi geet et";
        assert_eq!(strip_diarization(raw), "Moien\nwéi geet et");
    }

    #[test]
    fn keeps_bracketed_words_inside_speech() {
        let raw = "[0.00-1.00] SPEAKER_0: Moien [laughs] ech sinn do\n[1.00-2.00] SPEAKER_1: gutt";
        assert_eq!(strip_diarization(raw), "Moien [laughs] ech sinn do\ngutt");
    }

    #[test]
    fn leaves_plain_text_alone() {
        assert_eq!(strip_diarization("  just text "), "just text");
    }

    #[test]
    fn mode_parsing_rejects_unknown() {
        assert_eq!("LuxASR".parse::<AsrMode>().unwrap(), AsrMode::LuxAsr);
        assert_eq!("whisper".parse::<AsrMode>().unwrap(), AsrMode::Whisper);
        assert_eq!("furhat".parse::<AsrMode>().unwrap(), AsrMode::Furhat);
        assert!("google".parse::<AsrMode>().is_err());
        assert!(!AsrMode::Furhat.uses_microphone());
        assert!(AsrMode::LuxAsr.uses_microphone());
    }

    #[tokio::test]
    async fn platform_asr_uses_event_text() {
        let t = PlatformAsr
            .transcribe(&HeardUtterance::new("  Moien  "))
            .await
            .unwrap();
        assert_eq!(t.text, "Moien");
        assert!(t.audio_path.is_none());
    }

    #[test]
    fn remote_modes_need_capture_buffer() {
        let settings = AsrSettings::default();
        assert!(create_recognizer(AsrMode::Whisper, &settings, None).is_err());
        let capture = Arc::new(CaptureBuffer::new(CaptureSettings::default()));
        let r = create_recognizer(AsrMode::LuxAsr, &settings, Some(capture)).unwrap();
        assert_eq!(r.mode(), AsrMode::LuxAsr);
        assert_eq!(
            create_recognizer(AsrMode::Furhat, &settings, None).unwrap().mode(),
            AsrMode::Furhat
        );
    }
}
