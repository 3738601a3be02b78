//! Client configuration: built once at startup and handed to the components that need it.
//!
//! Sources, lowest priority first:
//! 1. built-in defaults (`#[serde(default)]` on every section)
//! 2. TOML file at `LUXBOT_CONFIG`, else `config/luxbot.toml` when present
//! 3. `LUXBOT_*` environment (`__` between nested keys, e.g. `LUXBOT_LLM__MODEL`)
//! 4. `PARTICIPANT_ID`, `TASK_ID`, `OPENAI_API_KEY`
//!
//! | Env | Default | Description |
//! |-----|---------|-------------|
//! | PARTICIPANT_ID | P_UNKNOWN | Participant id written into the session log name. |
//! | TASK_ID | T_UNKNOWN | Selects the task context prompt ("1"–"5"). |
//! | OPENAI_API_KEY | – | Required when the `openai` backend is selected. |

use crate::error::{CoreError, CoreResult};
use crate::llm::LlmBackendKind;
use luxbot_voice::{AsrMode, AsrSettings, CaptureSettings, TtsSettings};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const DEFAULT_CONFIG_PATH: &str = "config/luxbot.toml";
pub const DEFAULT_GREETING: &str = "Hello! How can I help you?";

/// Robot connection and listening behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RobotSettings {
    pub host: String,
    pub port: u16,
    /// Realtime API key, when the robot requires one.
    pub auth_key: Option<String>,
    /// Spoken once after connecting.
    pub greeting: String,
    /// Platform-side silence timeout ending a user utterance (seconds).
    pub end_speech_timeout: f32,
}

impl Default for RobotSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 9000,
            auth_key: None,
            greeting: DEFAULT_GREETING.to_string(),
            end_speech_timeout: 1.0,
        }
    }
}

/// LLM backend selection and endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub backend: LlmBackendKind,
    pub model: String,
    pub openai_base_url: String,
    pub openai_api_key: Option<String>,
    /// Self-hosted generation endpoint (`{prompt, max_tokens}` → `{text}`).
    pub luxllama_url: String,
    pub max_tokens: u32,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            backend: LlmBackendKind::OpenAi,
            model: "gpt-4o-mini".to_string(),
            openai_base_url: "https://api.openai.com/v1".to_string(),
            openai_api_key: None,
            luxllama_url: "http://127.0.0.1:8000/generate".to_string(),
            max_tokens: 128,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub participant_id: String,
    pub task_id: String,
    pub asr_mode: AsrMode,
    /// Sliding window of history entries sent with each prompt.
    pub history_window: usize,
    pub log_dir: PathBuf,
    pub robot: RobotSettings,
    pub capture: CaptureSettings,
    pub asr: AsrSettings,
    pub llm: LlmSettings,
    pub tts: TtsSettings,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            participant_id: "P_UNKNOWN".to_string(),
            task_id: "T_UNKNOWN".to_string(),
            asr_mode: AsrMode::Furhat,
            history_window: 4,
            log_dir: PathBuf::from("logs"),
            robot: RobotSettings::default(),
            capture: CaptureSettings::default(),
            asr: AsrSettings::default(),
            llm: LlmSettings::default(),
            tts: TtsSettings::default(),
        }
    }
}

impl ClientConfig {
    /// Load `.env`, then the layered sources described in the module docs.
    pub fn load() -> CoreResult<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            debug!("Loaded environment from {}", path.display());
        }
        let path = std::env::var("LUXBOT_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let mut cfg = Self::load_from(Path::new(&path))?;
        cfg.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(cfg)
    }

    /// Defaults, optional file at `path`, then `LUXBOT_*` environment.
    pub fn load_from(path: &Path) -> CoreResult<Self> {
        let builder = config::Config::builder();
        let builder = if path.exists() {
            info!("⚙️ Loading config from {}", path.display());
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

        Ok(built.try_deserialize()?)
    }

    /// Apply the plain (unprefixed) variables shared with the experiment tooling.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(id) = non_empty("PARTICIPANT_ID") {
            self.participant_id = id;
        }
        if let Some(id) = non_empty("TASK_ID") {
            self.task_id = id;
        }
        if self.llm.openai_api_key.as_deref().map_or(true, |k| k.trim().is_empty()) {
            if let Some(key) = non_empty("OPENAI_API_KEY") {
                self.llm.openai_api_key = Some(key);
            }
        }
    }

    /// Startup check. Missing OpenAI credentials for the OpenAI backend is fatal.
    pub fn validate(&self) -> CoreResult<()> {
        if self.llm.backend == LlmBackendKind::OpenAi
            && self.llm.openai_api_key.as_deref().map_or(true, |k| k.trim().is_empty())
        {
            return Err(CoreError::MissingCredentials(
                "OPENAI_API_KEY is required for the openai backend".to_string(),
            ));
        }
        if self.history_window == 0 {
            return Err(CoreError::Config("history_window must be at least 1".to_string()));
        }
        if self.capture.frame_ms == 0 {
            return Err(CoreError::Config("capture.frame_ms must be positive".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_match_the_deployed_client() {
        let cfg = ClientConfig::default();
        assert_eq!(cfg.robot.port, 9000);
        assert_eq!(cfg.history_window, 4);
        assert_eq!(cfg.asr_mode, AsrMode::Furhat);
        assert_eq!(cfg.llm.backend, LlmBackendKind::OpenAi);
        assert_eq!(cfg.llm.max_tokens, 128);
        assert_eq!(cfg.capture.preroll_frames(), 50);
        assert_eq!(cfg.tts.file_port, 8080);
    }

    #[test]
    fn file_values_override_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("luxbot.toml");
        std::fs::write(
            &path,
            r#"
asr_mode = "luxasr"
history_window = 6

[robot]
host = "192.168.1.20"

[llm]
backend = "luxllama"
luxllama_url = "http://gpu-box:8000/generate"
"#,
        )
        .unwrap();

        let cfg = ClientConfig::load_from(&path).unwrap();
        assert_eq!(cfg.asr_mode, AsrMode::LuxAsr);
        assert_eq!(cfg.history_window, 6);
        assert_eq!(cfg.robot.host, "192.168.1.20");
        assert_eq!(cfg.robot.port, 9000);
        assert_eq!(cfg.llm.backend, LlmBackendKind::LuxLlama);
        assert_eq!(cfg.llm.model, "gpt-4o-mini");
    }

    #[test]
    fn unknown_backend_in_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("luxbot.toml");
        std::fs::write(&path, "[llm]\nbackend = \"gpt-local\"\n").unwrap();
        assert!(matches!(ClientConfig::load_from(&path), Err(CoreError::Config(_))));
    }

    #[test]
    fn plain_env_overrides_apply() {
        let env: HashMap<&str, &str> = [
            ("PARTICIPANT_ID", "P07"),
            ("TASK_ID", "3"),
            ("OPENAI_API_KEY", "sk-test"),
        ]
        .into_iter()
        .collect();

        let mut cfg = ClientConfig::default();
        cfg.apply_env_overrides(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(cfg.participant_id, "P07");
        assert_eq!(cfg.task_id, "3");
        assert_eq!(cfg.llm.openai_api_key.as_deref(), Some("sk-test"));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn missing_openai_key_is_fatal() {
        let cfg = ClientConfig::default();
        assert!(matches!(cfg.validate(), Err(CoreError::MissingCredentials(_))));

        let mut lux = ClientConfig::default();
        lux.llm.backend = LlmBackendKind::LuxLlama;
        assert!(lux.validate().is_ok());
    }
}
