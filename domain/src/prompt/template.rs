//! Chat template for rendering turns into a raw engine prompt

use crate::session::turn::Turn;
use serde::{Deserialize, Serialize};

/// Default system prompt: short answers, one answer per question.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful AI assistant.
Answer concisely.
Answer the user's question once and then stop.";

/// Role prefixes/suffixes and system prompt for a completion-style model.
///
/// ```text
/// {system_prompt}\n
/// {user_prefix}{question}{user_suffix}
/// {assistant_prefix}{answer}{assistant_suffix}     <- one pair per history turn
/// {user_prefix}{question}{user_suffix}
/// {assistant_prefix}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatTemplate {
    pub system_prompt: String,
    pub user_prefix: String,
    pub user_suffix: String,
    pub assistant_prefix: String,
    pub assistant_suffix: String,
}

impl Default for ChatTemplate {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            user_prefix: "User: ".to_string(),
            user_suffix: "\n".to_string(),
            assistant_prefix: "Assistant: ".to_string(),
            assistant_suffix: "\n".to_string(),
        }
    }
}

impl ChatTemplate {
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    /// Render a prompt for `question`, preceded by `history` (oldest first).
    pub fn render(&self, question: &str, history: &[Turn]) -> String {
        let mut prompt = String::new();

        if !self.system_prompt.is_empty() {
            prompt.push_str(&self.system_prompt);
            prompt.push('\n');
        }

        for turn in history {
            self.push_user(&mut prompt, turn.question());
            prompt.push_str(&self.assistant_prefix);
            prompt.push_str(turn.answer());
            prompt.push_str(&self.assistant_suffix);
        }

        self.push_user(&mut prompt, question);
        prompt.push_str(&self.assistant_prefix);
        prompt
    }

    fn push_user(&self, prompt: &mut String, content: &str) {
        prompt.push_str(&self.user_prefix);
        prompt.push_str(content);
        prompt.push_str(&self.user_suffix);
    }
}
