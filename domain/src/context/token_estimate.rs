//! Character-based token usage estimate and cache status report.

use crate::core::string::char_len;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Heuristic token estimator.
///
/// - 0.4 tokens per character
/// - 50 tokens for the system prompt
/// - 20 tokens of template overhead per logged turn
pub struct TokenEstimate;

impl TokenEstimate {
    pub const SYSTEM_PROMPT_TOKENS: usize = 50;
    pub const TEMPLATE_TOKENS_PER_TURN: usize = 20;

    /// Estimated tokens for a piece of text. Rounds down.
    pub fn for_text(text: &str) -> usize {
        char_len(text) * 2 / 5
    }

    /// Estimated tokens for a logged question/answer pair.
    pub fn for_turn(question: &str, answer: &str) -> usize {
        Self::for_text(question) + Self::for_text(answer) + Self::TEMPLATE_TOKENS_PER_TURN
    }
}

/// Estimated context usage against the engine's window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStatus {
    pub context_size: u32,
    pub estimated_tokens: usize,
}

impl CacheStatus {
    /// Build a status from the logged history plus the in-flight turn.
    pub fn estimate(
        context_size: u32,
        history_tokens: usize,
        current_question: &str,
        current_output: &str,
    ) -> Self {
        let estimated_tokens = TokenEstimate::SYSTEM_PROMPT_TOKENS
            + history_tokens
            + TokenEstimate::for_text(current_question)
            + TokenEstimate::for_text(current_output);
        Self {
            context_size,
            estimated_tokens,
        }
    }

    /// Fraction of the context window in use, clamped to 1.0.
    pub fn usage_ratio(&self) -> f64 {
        if self.context_size == 0 {
            return 1.0;
        }
        (self.estimated_tokens as f64 / self.context_size as f64).min(1.0)
    }

    pub fn is_over_budget(&self) -> bool {
        self.estimated_tokens > self.context_size as usize
    }
}

impl fmt::Display for CacheStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "context max: {} tokens | current usage estimate: {} tokens (estimated)",
            self.context_size, self.estimated_tokens
        )
    }
}
