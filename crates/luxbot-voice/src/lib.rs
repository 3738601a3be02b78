//! # luxbot-voice — speech side of the dialogue client
//!
//! ```text
//!  mic (cpal) ──frames──▶ CaptureBuffer ──WAV──▶ SpeechRecognizer ──text──▶ (core)
//!                                                                             │
//!  robot ◀──URL── audio routes (axum) ◀──WAV── SpeechSynthesizer ◀──"lb:..."──┘
//! ```
//!
//! The robot itself handles playback; this crate only produces files and URLs.

pub mod audio;
pub mod audio_server;
pub mod capture;
pub mod error;
pub mod stt;
pub mod tts;

pub use audio::MicrophoneInput;
pub use audio_server::{audio_routes, local_ip, serve_audio_dir};
pub use capture::{CaptureBuffer, CaptureSettings};
pub use error::{VoiceError, VoiceResult};
pub use stt::{
    create_recognizer, strip_diarization, AsrMode, AsrSettings, HeardUtterance, LuxAsr,
    PlatformAsr, SpeechRecognizer, Transcript, WhisperServerAsr,
};
pub use tts::{
    split_language_tag, LocalTts, PiperVoice, RemoteTts, SpeechSynthesizer, TtsMode, TtsSettings,
    VoiceModel, VoiceRegistry, DEFAULT_LANGUAGE,
};
