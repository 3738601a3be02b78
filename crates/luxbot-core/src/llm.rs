//! LLM backends: hosted chat completion and the self-hosted generation endpoint.
//!
//! Both return raw model text with the emotion tags still embedded. Non-200 responses
//! and transport failures degrade to an empty string; the turn loop treats that as
//! "nothing to say" and goes back to listening.

use crate::config::LlmSettings;
use crate::dialogue::{ChatMessage, PromptPayload};
use crate::emotion::extract_emotions;
use crate::error::{CoreError, CoreResult};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LlmBackendKind {
    /// Hosted OpenAI-compatible chat completion.
    #[default]
    #[serde(rename = "openai")]
    OpenAi,
    /// Self-hosted LuxLLaMA generation server.
    #[serde(rename = "luxllama")]
    LuxLlama,
}

impl LlmBackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LlmBackendKind::OpenAi => "openai",
            LlmBackendKind::LuxLlama => "luxllama",
        }
    }
}

impl fmt::Display for LlmBackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LlmBackendKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(LlmBackendKind::OpenAi),
            "luxllama" => Ok(LlmBackendKind::LuxLlama),
            other => Err(CoreError::Config(format!(
                "unknown LLM backend '{}' (expected openai or luxllama)",
                other
            ))),
        }
    }
}

#[async_trait]
pub trait LanguageModel: Send + Sync {
    fn kind(&self) -> LlmBackendKind;

    /// Model name recorded in the session config.
    fn model_name(&self) -> &str;

    /// Raw reply text, or `""` when the backend could not answer.
    async fn generate(&self, prompt: &PromptPayload) -> CoreResult<String>;
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Deserialize)]
struct ChatMessageResponse {
    #[serde(default)]
    content: Option<String>,
}

/// Hosted chat completion (`POST {base}/chat/completions`, Bearer auth, no streaming).
pub struct OpenAiChat {
    base_url: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl OpenAiChat {
    pub fn new(base_url: &str, api_key: &str, model: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.trim().to_string(),
            model: model.to_string(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl LanguageModel for OpenAiChat {
    fn kind(&self) -> LlmBackendKind {
        LlmBackendKind::OpenAi
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &PromptPayload) -> CoreResult<String> {
        let PromptPayload::Messages(messages) = prompt else {
            return Err(CoreError::Llm("chat backend needs a message list".to_string()));
        };

        let url = format!("{}/chat/completions", self.base_url);
        let body = ChatRequest {
            model: &self.model,
            messages,
        };

        let res = match self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
        {
            Ok(res) => res,
            Err(e) => {
                warn!("[OpenAI] Request failed: {}", e);
                return Ok(String::new());
            }
        };

        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            warn!("[OpenAI] API error {}: {}", status, body);
            return Ok(String::new());
        }

        let parsed: ChatResponse = match res.json().await {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!("[OpenAI] Response parse failed: {}", e);
                return Ok(String::new());
            }
        };

        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();
        debug!("[OpenAI] {} chars", text.len());
        Ok(text.trim().to_string())
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    prompt: &'a str,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    text: String,
}

/// Self-hosted generation server (`{prompt, max_tokens}` → `{text}`), output cleaned
/// with [`clean_self_hosted_output`].
pub struct SelfHostedLlm {
    endpoint: String,
    max_tokens: u32,
    client: reqwest::Client,
}

impl SelfHostedLlm {
    pub fn new(endpoint: &str, max_tokens: u32) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            max_tokens,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl LanguageModel for SelfHostedLlm {
    fn kind(&self) -> LlmBackendKind {
        LlmBackendKind::LuxLlama
    }

    fn model_name(&self) -> &str {
        "LuxLLaMA"
    }

    async fn generate(&self, prompt: &PromptPayload) -> CoreResult<String> {
        let PromptPayload::Text(prompt) = prompt else {
            return Err(CoreError::Llm("self-hosted backend needs a text prompt".to_string()));
        };

        let res = match self
            .client
            .post(&self.endpoint)
            .json(&GenerateRequest {
                prompt,
                max_tokens: self.max_tokens,
            })
            .send()
            .await
        {
            Ok(res) => res,
            Err(e) => {
                warn!("[LuxLLaMA] Request failed: {}", e);
                return Ok(String::new());
            }
        };

        if !res.status().is_success() {
            warn!("[LuxLLaMA] Error: {}", res.status());
            return Ok(String::new());
        }

        let raw = match res.json::<GenerateResponse>().await {
            Ok(body) => body.text,
            Err(e) => {
                warn!("[LuxLLaMA] Response parse failed: {}", e);
                return Ok(String::new());
            }
        };
        Ok(clean_self_hosted_output(&raw))
    }
}

static FIRST_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<user_emotion\s*=").expect("valid tag start regex"));
static TRAILING_LANG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(?:\b(lb|en|fr):\s*)+$").expect("valid trailing prefix regex"));
static TRAILING_MARKUP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[<>\s]*$").expect("valid trailing markup regex"));

/// Normalise raw self-hosted output: the model tends to keep generating further turns
/// and stray markup after its reply.
///
/// Keeps only the reply text before the first emotion tag and after the last
/// `<assistant>` marker, drops trailing language codes and markup, then re-appends
/// both tags in canonical form.
pub fn clean_self_hosted_output(raw: &str) -> String {
    let labels = extract_emotions(raw);

    let head = FIRST_TAG.split(raw).next().unwrap_or_default();
    let reply = head.rsplit("<assistant>").next().unwrap_or_default();
    let reply = TRAILING_LANG.replace(reply, "");
    let reply = TRAILING_MARKUP.replace(&reply, "");

    format!(
        "{} <user_emotion={}><response_emotion={}>",
        reply.trim(),
        labels.user,
        labels.response
    )
}

/// Build the configured backend. The OpenAI key must already be validated.
pub fn create_language_model(settings: &LlmSettings) -> CoreResult<Arc<dyn LanguageModel>> {
    let model: Arc<dyn LanguageModel> = match settings.backend {
        LlmBackendKind::OpenAi => {
            let key = settings
                .openai_api_key
                .as_deref()
                .filter(|k| !k.trim().is_empty())
                .ok_or_else(|| CoreError::MissingCredentials("OPENAI_API_KEY".to_string()))?;
            Arc::new(OpenAiChat::new(&settings.openai_base_url, key, &settings.model))
        }
        LlmBackendKind::LuxLlama => Arc::new(SelfHostedLlm::new(&settings.luxllama_url, settings.max_tokens)),
    };
    info!("🧠 LLM backend: {} ({})", model.kind(), model.model_name());
    Ok(model)
}
