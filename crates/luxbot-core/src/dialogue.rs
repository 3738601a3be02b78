//! Dialogue history (sliding window) and backend-specific prompt construction.

use crate::llm::LlmBackendKind;
use crate::prompts::{task_context, CHAT_INTERACTION_RULES, SELF_HOSTED_INTERACTION_RULES};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// Chat message in the hosted-API wire shape (`{role, content}`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Last `window` user/assistant entries, oldest evicted first.
#[derive(Debug, Clone)]
pub struct DialogueHistory {
    window: usize,
    entries: VecDeque<ChatMessage>,
}

impl DialogueHistory {
    pub fn new(window: usize) -> Self {
        Self {
            window,
            entries: VecDeque::with_capacity(window + 1),
        }
    }

    pub fn push_user(&mut self, text: impl Into<String>) {
        self.push(ChatMessage::new(Role::User, text));
    }

    pub fn push_assistant(&mut self, text: impl Into<String>) {
        self.push(ChatMessage::new(Role::Assistant, text));
    }

    /// Drop the trailing user entry when no reply followed it.
    pub fn pop_unanswered(&mut self) -> Option<ChatMessage> {
        match self.entries.back() {
            Some(last) if last.role == Role::User => self.entries.pop_back(),
            _ => None,
        }
    }

    fn push(&mut self, message: ChatMessage) {
        self.entries.push_back(message);
        while self.entries.len() > self.window {
            self.entries.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn entries(&self) -> impl Iterator<Item = &ChatMessage> {
        self.entries.iter()
    }
}

/// Backend-shaped prompt.
#[derive(Debug, Clone, PartialEq)]
pub enum PromptPayload {
    /// Hosted chat API: system + history + new user message.
    Messages(Vec<ChatMessage>),
    /// Self-hosted generation: one tagged text block ending in an open `<assistant>`.
    Text(String),
}

/// Builds prompts for the configured task.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    task_id: String,
}

impl PromptBuilder {
    pub fn new(task_id: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
        }
    }

    /// Interaction rules for `kind`, plus the task context when the task id is known.
    pub fn system_prompt(&self, kind: LlmBackendKind) -> String {
        let rules = match kind {
            LlmBackendKind::OpenAi => CHAT_INTERACTION_RULES,
            LlmBackendKind::LuxLlama => SELF_HOSTED_INTERACTION_RULES,
        };
        match task_context(&self.task_id) {
            Some(context) => format!("{}\n\n{}", rules, context),
            None => rules.to_string(),
        }
    }

    /// `history` must not yet contain `utterance`.
    pub fn build(&self, kind: LlmBackendKind, history: &DialogueHistory, utterance: &str) -> PromptPayload {
        let system = self.system_prompt(kind);
        match kind {
            LlmBackendKind::OpenAi => {
                let mut messages = Vec::with_capacity(history.len() + 2);
                messages.push(ChatMessage::new(Role::System, system));
                messages.extend(history.entries().cloned());
                messages.push(ChatMessage::new(Role::User, utterance));
                PromptPayload::Messages(messages)
            }
            LlmBackendKind::LuxLlama => {
                let mut prompt = format!("<system>\n{}\n</system>\n\n", system);
                for entry in history.entries() {
                    let tag = entry.role.as_str();
                    prompt.push_str(&format!("<{tag}>\n{}\n</{tag}>\n\n", entry.content));
                }
                prompt.push_str(&format!("<user>\n{}\n</user>\n\n", utterance));
                prompt.push_str("<assistant>\n");
                PromptPayload::Text(prompt)
            }
        }
    }
}
