//! Session configuration from TOML (`[session]` section)

use pocket_application::{FallbackMessages, SessionParams};
use pocket_domain::ChatTemplate;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Raw session configuration from TOML
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileSessionConfig {
    /// Wall-clock limit per turn in seconds
    pub timeout_seconds: u64,
    /// Maximum answer length in characters
    pub max_response_chars: usize,
    /// Prior turns fed back as context (0 = independent turns)
    pub history_turns: usize,
    /// Overrides the built-in system prompt
    pub system_prompt: Option<String>,
    /// Texts returned when no usable answer was produced
    pub fallback: FallbackMessages,
}

impl Default for FileSessionConfig {
    fn default() -> Self {
        let params = SessionParams::default();
        Self {
            timeout_seconds: params.timeout.as_secs(),
            max_response_chars: params.max_response_chars,
            history_turns: params.history_turns,
            system_prompt: None,
            fallback: params.fallbacks,
        }
    }
}

impl FileSessionConfig {
    pub fn to_session_params(&self) -> SessionParams {
        let template = match &self.system_prompt {
            Some(prompt) => ChatTemplate::default().with_system_prompt(prompt.clone()),
            None => ChatTemplate::default(),
        };
        SessionParams::default()
            .with_timeout(Duration::from_secs(self.timeout_seconds))
            .with_max_response_chars(self.max_response_chars)
            .with_history_turns(self.history_turns)
            .with_template(template)
            .with_fallbacks(self.fallback.clone())
    }
}
