//! Prompt texts for the two LLM backends.

pub mod interaction;
pub mod tasks;

pub use interaction::{CHAT_INTERACTION_RULES, SELF_HOSTED_INTERACTION_RULES};
pub use tasks::task_context;
