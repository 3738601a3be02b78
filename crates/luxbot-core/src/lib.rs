//! # luxbot-core — dialogue side of the robot client
//!
//! ```text
//!  robot events ──▶ TurnOrchestrator ──▶ SpeechRecognizer (luxbot-voice)
//!                         │
//!                         ├──▶ PromptBuilder + DialogueHistory ──▶ LanguageModel
//!                         ├──▶ extract_emotions ──▶ gesture
//!                         ├──▶ SessionLogger
//!                         └──▶ SpeechSynthesizer (luxbot-voice) ──▶ robot speak_audio
//! ```

pub mod config;
pub mod dialogue;
pub mod emotion;
pub mod error;
pub mod llm;
pub mod orchestrator;
pub mod prompts;
pub mod robot;
pub mod session;

pub use config::{ClientConfig, LlmSettings, RobotSettings};
pub use dialogue::{ChatMessage, DialogueHistory, PromptBuilder, PromptPayload, Role};
pub use emotion::{
    extract_emotions, split_language_prefix, thinking_gesture, EmotionLabel,
    EmotionReading,
};
pub use error::{CoreError, CoreResult};
pub use llm::{
    clean_self_hosted_output, create_language_model, LanguageModel, LlmBackendKind, OpenAiChat,
    SelfHostedLlm,
};
pub use orchestrator::{OrchestratorSettings, TurnOrchestrator, TurnOutcome, TurnState, SHUTDOWN_NOTE};
pub use robot::{FurhatClient, Gesture, ListenOptions, RobotEvent, RobotPlatform};
pub use session::{SessionConfig, SessionLogger, SessionRecord, SessionSummary, TurnRecord};
