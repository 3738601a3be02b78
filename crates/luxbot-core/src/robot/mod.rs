//! Robot platform surface consumed by the turn loop.

pub mod furhat;

pub use furhat::FurhatClient;

use crate::error::CoreResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Events the turn loop reacts to.
#[derive(Debug, Clone, PartialEq)]
pub enum RobotEvent {
    /// Robot opened its microphone.
    ListenStart,
    /// User started speaking.
    HearStart,
    /// User finished speaking; `text` is the platform transcript (may be empty).
    HearEnd { text: String },
    /// Robot finished speaking.
    SpeakEnd,
    /// Connection to the robot is gone.
    Disconnected,
    /// Anything else the platform sends.
    Other(String),
}

/// Listen request parameters. The end-of-speech timeout is platform-side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListenOptions {
    pub partial: bool,
    pub concat: bool,
    pub stop_user_end: bool,
    pub stop_robot_start: bool,
    pub stop_no_speech: bool,
    pub end_speech_timeout: f32,
}

impl Default for ListenOptions {
    fn default() -> Self {
        Self {
            partial: false,
            concat: true,
            stop_user_end: true,
            stop_robot_start: true,
            stop_no_speech: true,
            end_speech_timeout: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gesture {
    pub name: String,
    pub intensity: f32,
    pub duration: f32,
}

impl Gesture {
    pub fn new(name: &str, intensity: f32, duration: f32) -> Self {
        Self {
            name: name.to_string(),
            intensity,
            duration,
        }
    }
}

#[async_trait]
pub trait RobotPlatform: Send + Sync {
    async fn attend_user(&self) -> CoreResult<()>;

    async fn speak_text(&self, text: &str) -> CoreResult<()>;

    /// Play audio from `url`; `abort` cuts off anything currently being said.
    async fn speak_audio(&self, url: &str, abort: bool) -> CoreResult<()>;

    async fn start_listening(&self, options: &ListenOptions) -> CoreResult<()>;

    async fn stop_listening(&self) -> CoreResult<()>;

    async fn gesture(&self, gesture: &Gesture) -> CoreResult<()>;

    async fn disconnect(&self) -> CoreResult<()>;
}
