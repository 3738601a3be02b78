//! **Turn orchestrator** — listen → transcribe → think → emote → synthesize → speak.
//!
//! One task drives the state machine from the robot's event stream. A turn that fails
//! anywhere is logged and the machine returns to `Listening`; only cancellation,
//! a closed event stream or a robot disconnect end the loop. Shutdown writes the
//! session log and then stops listening and disconnects, best-effort.

use crate::dialogue::{DialogueHistory, PromptBuilder};
use crate::emotion::{extract_emotions, split_language_prefix, thinking_gesture};
use crate::error::{CoreError, CoreResult};
use crate::llm::LanguageModel;
use crate::robot::{Gesture, ListenOptions, RobotEvent, RobotPlatform};
use crate::session::{SessionConfig, SessionLogger, TurnRecord};
use chrono::Utc;
use luxbot_voice::{HeardUtterance, SpeechRecognizer, SpeechSynthesizer, DEFAULT_LANGUAGE};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub const SHUTDOWN_NOTE: &str = "Session ended by experimenter or system";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    Idle,
    Listening,
    Capturing,
    Transcribing,
    Thinking,
    Emoting,
    Synthesizing,
    Speaking,
}

/// What a completed turn produced.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    /// Nothing usable was heard or said; back to listening.
    Skipped,
    /// Reply handed to the robot.
    Spoken { audio_url: String },
}

/// Startup parameters for the session and the robot interaction.
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub participant_id: String,
    pub task_id: String,
    pub history_window: usize,
    pub greeting: Option<String>,
    pub listen: ListenOptions,
}

pub struct TurnOrchestrator {
    robot: Arc<dyn RobotPlatform>,
    asr: Arc<dyn SpeechRecognizer>,
    llm: Arc<dyn LanguageModel>,
    tts: Arc<dyn SpeechSynthesizer>,
    history: DialogueHistory,
    prompts: PromptBuilder,
    logger: SessionLogger,
    listen: ListenOptions,
    greeting: Option<String>,
    state: TurnState,
    cancel: CancellationToken,
}

impl TurnOrchestrator {
    /// Build the orchestrator and open the session.
    pub fn new(
        settings: OrchestratorSettings,
        robot: Arc<dyn RobotPlatform>,
        asr: Arc<dyn SpeechRecognizer>,
        llm: Arc<dyn LanguageModel>,
        tts: Arc<dyn SpeechSynthesizer>,
        mut logger: SessionLogger,
        cancel: CancellationToken,
    ) -> Self {
        logger.start_session(
            &settings.participant_id,
            &settings.task_id,
            SessionConfig {
                asr_mode: asr.mode().to_string(),
                llm_backend: llm.kind().to_string(),
                model: llm.model_name().to_string(),
            },
        );
        Self {
            robot,
            asr,
            llm,
            tts,
            history: DialogueHistory::new(settings.history_window),
            prompts: PromptBuilder::new(settings.task_id),
            logger,
            listen: settings.listen,
            greeting: settings.greeting,
            state: TurnState::Idle,
            cancel,
        }
    }

    pub fn state(&self) -> TurnState {
        self.state
    }

    pub fn history(&self) -> &DialogueHistory {
        &self.history
    }

    pub fn logger(&self) -> &SessionLogger {
        &self.logger
    }

    /// Drive the conversation until cancelled or disconnected. Returns the session log path.
    pub async fn run(&mut self, mut events: mpsc::Receiver<RobotEvent>) -> CoreResult<Option<PathBuf>> {
        if let Err(e) = self.robot.attend_user().await {
            warn!("Attend request failed: {}", e);
        }
        if let Some(greeting) = self.greeting.clone() {
            if let Err(e) = self.robot.speak_text(&greeting).await {
                warn!("Greeting failed: {}", e);
            }
        }
        self.listen_again().await;

        let cancel = self.cancel.clone();
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("🛑 Shutdown requested");
                    break;
                }
                event = events.recv() => match event {
                    Some(RobotEvent::Disconnected) | None => {
                        warn!("Robot connection lost; ending session");
                        break;
                    }
                    Some(event) => self.handle_event(event).await,
                },
            }
        }

        self.shutdown().await
    }

    /// React to one platform event.
    pub async fn handle_event(&mut self, event: RobotEvent) {
        match event {
            RobotEvent::ListenStart => {
                debug!("[Listen] Robot started listening");
                if self.asr.mode().uses_microphone() {
                    self.asr.begin_capture();
                    self.state = TurnState::Capturing;
                }
            }
            RobotEvent::HearStart => debug!("[Turn] User started speaking"),
            RobotEvent::HearEnd { text } => {
                debug!("[Turn] User stopped speaking");
                self.handle_turn(HeardUtterance::new(text)).await;
            }
            RobotEvent::SpeakEnd => {
                debug!("[Robot] Ready");
                self.listen_again().await;
            }
            RobotEvent::Disconnected => warn!("Robot disconnected"),
            RobotEvent::Other(kind) => debug!("Ignoring robot event {}", kind),
        }
    }

    /// Run one turn. Failures never escape: they are logged and listening resumes.
    pub async fn handle_turn(&mut self, heard: HeardUtterance) -> TurnOutcome {
        match self.process_turn(heard).await {
            Ok(TurnOutcome::Skipped) => {
                self.listen_again().await;
                TurnOutcome::Skipped
            }
            Ok(outcome) => outcome,
            Err(CoreError::Cancelled) => {
                debug!("Turn abandoned for shutdown");
                TurnOutcome::Skipped
            }
            Err(e) => {
                error!("[ERROR] handle_turn: {}", e);
                self.listen_again().await;
                TurnOutcome::Skipped
            }
        }
    }

    fn checkpoint(&self) -> CoreResult<()> {
        if self.cancel.is_cancelled() {
            return Err(CoreError::Cancelled);
        }
        Ok(())
    }

    async fn process_turn(&mut self, heard: HeardUtterance) -> CoreResult<TurnOutcome> {
        let started = Utc::now();

        self.state = TurnState::Transcribing;
        let transcript = self.asr.transcribe(&heard).await?;
        if transcript.is_empty() {
            info!("[ASR] Empty transcription");
            return Ok(TurnOutcome::Skipped);
        }
        let user_text = transcript.text.trim().to_string();
        info!("👤 User ({}): {}", self.asr.mode(), user_text);
        self.checkpoint()?;

        self.state = TurnState::Thinking;
        let prompt = self.prompts.build(self.llm.kind(), &self.history, &user_text);
        self.history.push_user(user_text.clone());
        self.try_gesture(&thinking_gesture()).await;
        let raw = self.llm.generate(&prompt).await?;
        self.checkpoint()?;

        self.state = TurnState::Emoting;
        let reading = extract_emotions(&raw);
        if reading.malformed {
            warn!("Model reply missing emotion tags: {:?}", raw);
        }
        let (lang, spoken) = split_language_prefix(&reading.text);
        if spoken.is_empty() {
            info!("[LLM] Empty reply");
            self.history.pop_unanswered();
            return Ok(TurnOutcome::Skipped);
        }
        info!(
            "🤖 Assistant: {} | user={} response={}",
            spoken, reading.user, reading.response
        );
        self.history.push_assistant(spoken.clone());
        self.logger.log_turn(TurnRecord::new(
            started,
            user_text,
            reading.user,
            spoken.clone(),
            reading.response,
            transcript.audio_path,
        ));
        self.try_gesture(&reading.response.gesture()).await;
        self.checkpoint()?;

        self.state = TurnState::Synthesizing;
        let lang = lang.unwrap_or_else(|| DEFAULT_LANGUAGE.to_string());
        let audio_url = self.tts.synthesize(&format!("{}:{}", lang, spoken)).await?;
        self.checkpoint()?;

        self.robot.speak_audio(&audio_url, true).await?;
        self.state = TurnState::Speaking;
        Ok(TurnOutcome::Spoken { audio_url })
    }

    async fn try_gesture(&self, gesture: &Gesture) {
        match self.robot.gesture(gesture).await {
            Ok(()) => debug!("[Emotion] Gesture {}", gesture.name),
            Err(e) => warn!("[Emotion] Gesture {} failed: {}", gesture.name, e),
        }
    }

    async fn listen_again(&mut self) {
        self.state = TurnState::Listening;
        if self.cancel.is_cancelled() {
            return;
        }
        if let Err(e) = self.robot.start_listening(&self.listen).await {
            warn!("Listen request failed: {}", e);
        }
    }

    /// Write the session log, then best-effort stop listening and disconnect.
    pub async fn shutdown(&mut self) -> CoreResult<Option<PathBuf>> {
        info!("Shutting down...");
        self.cancel.cancel();
        let saved = self.logger.end_session(true, Some(SHUTDOWN_NOTE));

        if let Err(e) = self.robot.stop_listening().await {
            warn!("Listen stop failed during shutdown: {}", e);
        }
        if let Err(e) = self.robot.disconnect().await {
            warn!("Disconnect failed during shutdown: {}", e);
        }
        self.state = TurnState::Idle;
        saved
    }
}
