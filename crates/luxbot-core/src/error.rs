//! Error types for the dialogue core

use luxbot_voice::VoiceError;
use thiserror::Error;

pub type CoreResult<T> = Result<T, CoreError>;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Configuration error: {0}")]
    Config(String),

    /// The only fatal startup error.
    #[error("Missing credentials: {0}")]
    MissingCredentials(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Robot error: {0}")]
    Robot(String),

    #[error("Session log error: {0}")]
    Session(String),

    #[error(transparent)]
    Voice(#[from] VoiceError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Turn cancelled")]
    Cancelled,
}

impl From<config::ConfigError> for CoreError {
    fn from(err: config::ConfigError) -> Self {
        CoreError::Config(err.to_string())
    }
}
