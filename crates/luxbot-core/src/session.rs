//! Session log: one JSON document per conversation, written once at shutdown.
//!
//! File name: `<participant>_task<task>_<session uuid>.json` under the log directory.

use crate::emotion::EmotionLabel;
use crate::error::{CoreError, CoreResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use uuid::Uuid;

/// Snapshot of the pipeline configuration the session ran with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub asr_mode: String,
    pub llm_backend: String,
    pub model: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub asr_text: String,
    pub emotion: EmotionLabel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssistantRecord {
    pub response_text: String,
    pub emotion: EmotionLabel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioRecord {
    pub user_audio: Option<PathBuf>,
}

/// One completed exchange. Immutable once logged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnRecord {
    pub turn_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub user: UserRecord,
    pub assistant: AssistantRecord,
    pub audio: AudioRecord,
}

impl TurnRecord {
    pub fn new(
        timestamp: DateTime<Utc>,
        user_text: impl Into<String>,
        user_emotion: EmotionLabel,
        response_text: impl Into<String>,
        response_emotion: EmotionLabel,
        user_audio: Option<PathBuf>,
    ) -> Self {
        Self {
            turn_id: Uuid::new_v4(),
            timestamp,
            user: UserRecord {
                asr_text: user_text.into(),
                emotion: user_emotion,
            },
            assistant: AssistantRecord {
                response_text: response_text.into(),
                emotion: response_emotion,
            },
            audio: AudioRecord { user_audio },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub num_turns: usize,
    pub completed: bool,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub session_id: Uuid,
    pub participant_id: String,
    pub task_id: String,
    pub config: SessionConfig,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub turns: Vec<TurnRecord>,
    pub summary: Option<SessionSummary>,
}

/// Owns the active session. Only the orchestrator mutates it.
#[derive(Debug)]
pub struct SessionLogger {
    dir: PathBuf,
    session: Option<SessionRecord>,
}

impl SessionLogger {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            session: None,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn start_session(&mut self, participant_id: &str, task_id: &str, config: SessionConfig) -> Uuid {
        let session = SessionRecord {
            session_id: Uuid::new_v4(),
            participant_id: participant_id.to_string(),
            task_id: task_id.to_string(),
            config,
            start_time: Utc::now(),
            end_time: None,
            turns: Vec::new(),
            summary: None,
        };
        let id = session.session_id;
        info!(session_id = %id, participant = participant_id, task = task_id, "📝 Session started");
        self.session = Some(session);
        id
    }

    pub fn session(&self) -> Option<&SessionRecord> {
        self.session.as_ref()
    }

    pub fn log_turn(&mut self, turn: TurnRecord) {
        match self.session.as_mut() {
            Some(session) => session.turns.push(turn),
            None => warn!("Turn logged without an active session; dropped"),
        }
    }

    /// Finalise and write the session. Returns `None` when no session was active,
    /// so a second call is a no-op.
    pub fn end_session(&mut self, completed: bool, notes: Option<&str>) -> CoreResult<Option<PathBuf>> {
        let Some(mut session) = self.session.take() else {
            return Ok(None);
        };

        session.end_time = Some(Utc::now());
        session.summary = Some(SessionSummary {
            num_turns: session.turns.len(),
            completed,
            notes: notes.map(str::to_string),
        });

        std::fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(format!(
            "{}_task{}_{}.json",
            session.participant_id, session.task_id, session.session_id
        ));
        let json = serde_json::to_string_pretty(&session)?;
        std::fs::write(&path, json)
            .map_err(|e| CoreError::Session(format!("cannot write {}: {}", path.display(), e)))?;

        info!("💾 Interaction saved to {} ({} turns)", path.display(), session.turns.len());
        Ok(Some(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SessionConfig {
        SessionConfig {
            asr_mode: "luxasr".to_string(),
            llm_backend: "openai".to_string(),
            model: "gpt-4o-mini".to_string(),
        }
    }

    #[test]
    fn writes_one_named_file_with_summary() {
        let dir = tempfile::tempdir().unwrap();
        let mut logger = SessionLogger::new(dir.path());
        let id = logger.start_session("P07", "3", config());
        logger.log_turn(TurnRecord::new(
            Utc::now(),
            "I'm tired",
            EmotionLabel::Sad,
            "Maybe relax at a cafe.",
            EmotionLabel::Calm,
            Some(PathBuf::from("temp_audio/user_x.wav")),
        ));

        let path = logger.end_session(true, Some("done")).unwrap().unwrap();
        assert_eq!(
            path.file_name().unwrap().to_string_lossy(),
            format!("P07_task3_{}.json", id)
        );

        let record: SessionRecord = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(record.turns.len(), 1);
        assert_eq!(record.turns[0].user.emotion, EmotionLabel::Sad);
        assert_eq!(record.turns[0].assistant.response_text, "Maybe relax at a cafe.");
        let summary = record.summary.unwrap();
        assert_eq!(summary.num_turns, 1);
        assert!(summary.completed);
        assert_eq!(summary.notes.as_deref(), Some("done"));
        assert!(record.end_time.unwrap() >= record.start_time);
    }

    #[test]
    fn json_field_names_are_stable() {
        let turn = TurnRecord::new(Utc::now(), "hi", EmotionLabel::Happy, "hello", EmotionLabel::Calm, None);
        let value = serde_json::to_value(&turn).unwrap();
        assert_eq!(value["user"]["asr_text"], "hi");
        assert_eq!(value["user"]["emotion"], "Happy");
        assert_eq!(value["assistant"]["response_text"], "hello");
        assert!(value["audio"]["user_audio"].is_null());
    }

    #[test]
    fn ending_twice_writes_once() {
        let dir = tempfile::tempdir().unwrap();
        let mut logger = SessionLogger::new(dir.path());
        logger.start_session("P1", "1", config());
        assert!(logger.end_session(true, None).unwrap().is_some());
        assert!(logger.end_session(true, None).unwrap().is_none());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
