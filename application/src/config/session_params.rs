//! Session parameters: turn limits and fallback texts.
//!
//! [`SessionParams`] groups the static parameters that bound a single turn
//! in [`SessionController`](crate::use_cases::session_controller::SessionController).
//! The engine enforces none of these itself.

use pocket_domain::{ChatTemplate, DomainError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// User-facing texts returned when a turn produced no usable answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackMessages {
    /// Timer fired before any text arrived.
    pub timeout: String,
    /// The engine reported a failure.
    pub engine_error: String,
    /// The stream ended (or was aborted) without any text.
    pub empty: String,
    /// The engine never initialized.
    pub unavailable: String,
}

impl Default for FallbackMessages {
    fn default() -> Self {
        Self {
            timeout: "Unable to generate a response. Please try again.".to_string(),
            engine_error: "An error occurred while generating the response. Please try again."
                .to_string(),
            empty: "Unable to generate a response.".to_string(),
            unavailable: "The language model is unavailable.".to_string(),
        }
    }
}

/// Turn control parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionParams {
    /// Wall-clock limit for one turn.
    pub timeout: Duration,
    /// Maximum answer length in characters.
    pub max_response_chars: usize,
    /// Prior turns fed back into the prompt. 0 answers every turn on its own.
    pub history_turns: usize,
    /// Prompt template for rendering turns.
    pub template: ChatTemplate,
    /// Fallback texts.
    pub fallbacks: FallbackMessages,
}

impl Default for SessionParams {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            max_response_chars: 200,
            history_turns: 0,
            template: ChatTemplate::default(),
            fallbacks: FallbackMessages::default(),
        }
    }
}

impl SessionParams {
    // ==================== Builder Methods ====================

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_response_chars(mut self, max: usize) -> Self {
        self.max_response_chars = max;
        self
    }

    pub fn with_history_turns(mut self, turns: usize) -> Self {
        self.history_turns = turns;
        self
    }

    pub fn with_template(mut self, template: ChatTemplate) -> Self {
        self.template = template;
        self
    }

    pub fn with_fallbacks(mut self, fallbacks: FallbackMessages) -> Self {
        self.fallbacks = fallbacks;
        self
    }

    /// Reject limits that would finalize every turn immediately.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.timeout.is_zero() {
            return Err(DomainError::ZeroLimit("timeout"));
        }
        if self.max_response_chars == 0 {
            return Err(DomainError::ZeroLimit("max_response_chars"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default() {
        let params = SessionParams::default();
        assert_eq!(params.timeout, Duration::from_secs(5));
        assert_eq!(params.max_response_chars, 200);
        assert_eq!(params.history_turns, 0);
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let params = SessionParams::default()
            .with_timeout(Duration::from_millis(250))
            .with_max_response_chars(80)
            .with_history_turns(2);

        assert_eq!(params.timeout, Duration::from_millis(250));
        assert_eq!(params.max_response_chars, 80);
        assert_eq!(params.history_turns, 2);
    }

    #[test]
    fn test_validate_rejects_zero_limits() {
        let params = SessionParams::default().with_timeout(Duration::ZERO);
        assert_eq!(params.validate(), Err(DomainError::ZeroLimit("timeout")));

        let params = SessionParams::default().with_max_response_chars(0);
        assert_eq!(
            params.validate(),
            Err(DomainError::ZeroLimit("max_response_chars"))
        );
    }

    #[test]
    fn test_fallback_texts_mention_failure() {
        let fallbacks = FallbackMessages::default();
        assert!(fallbacks.timeout.starts_with("Unable to generate"));
        assert!(fallbacks.empty.starts_with("Unable to generate"));
    }
}
