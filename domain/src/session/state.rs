//! Observable session state and its phase machine.
//!
//! ```text
//! Idle ──begin──▶ Generating ──complete──▶ Completed(outcome) ──clear──▶ Idle
//!   ▲                  │                                                 │
//!   └──── clear ───────┴─────────────────────────────────────────────────┘
//! ```
//!
//! Only `Generating` may be entered, and only from `Idle`. `clear` is the
//! forced path back to `Idle` from anywhere.

use super::turn::TurnOutcome;
use crate::core::error::DomainError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle phase of a session controller
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "phase", content = "outcome")]
pub enum SessionPhase {
    #[default]
    Idle,
    Generating,
    Completed(TurnOutcome),
}

impl SessionPhase {
    pub fn can_transition_to(&self, next: &SessionPhase) -> bool {
        matches!(
            (self, next),
            (SessionPhase::Idle, SessionPhase::Generating)
                | (SessionPhase::Generating, SessionPhase::Completed(_))
                | (_, SessionPhase::Idle)
        )
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionPhase::Idle => f.write_str("idle"),
            SessionPhase::Generating => f.write_str("generating"),
            SessionPhase::Completed(outcome) => write!(f, "completed({})", outcome),
        }
    }
}

/// Snapshot of a controller's per-turn state.
///
/// The fields are advisory: a UI renders them while a turn streams, but the
/// returned answer is the correctness contract, not this snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    current_question: String,
    accumulated_output: String,
    is_generating: bool,
    is_completed: bool,
    phase: SessionPhase,
    last_outcome: Option<TurnOutcome>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            current_question: String::new(),
            accumulated_output: String::new(),
            is_generating: false,
            is_completed: true,
            phase: SessionPhase::Idle,
            last_outcome: None,
        }
    }
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    // ==================== Accessors ====================

    pub fn current_question(&self) -> &str {
        &self.current_question
    }

    pub fn accumulated_output(&self) -> &str {
        &self.accumulated_output
    }

    pub fn is_generating(&self) -> bool {
        self.is_generating
    }

    pub fn is_completed(&self) -> bool {
        self.is_completed
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn last_outcome(&self) -> Option<TurnOutcome> {
        self.last_outcome
    }

    // ==================== Transitions ====================

    /// Enter `Generating` for a new question. Only valid from `Idle`.
    pub fn begin_turn(&mut self, question: impl Into<String>) -> Result<(), DomainError> {
        self.transition(SessionPhase::Generating)?;
        self.current_question = question.into();
        self.accumulated_output.clear();
        self.is_generating = true;
        self.is_completed = false;
        Ok(())
    }

    /// Mirror the text accumulated so far. Ignored outside `Generating`.
    pub fn record_output(&mut self, text: &str) {
        if self.phase == SessionPhase::Generating {
            self.accumulated_output.clear();
            self.accumulated_output.push_str(text);
        }
    }

    /// Finalize the in-flight turn with the user-facing answer.
    pub fn complete(&mut self, answer: &str, outcome: TurnOutcome) -> Result<(), DomainError> {
        self.transition(SessionPhase::Completed(outcome))?;
        self.accumulated_output.clear();
        self.accumulated_output.push_str(answer);
        self.is_generating = false;
        self.is_completed = true;
        self.last_outcome = Some(outcome);
        Ok(())
    }

    /// Forced return to `Idle`, wiping per-turn fields.
    ///
    /// `last_outcome` survives so observers can still tell how the previous
    /// turn ended.
    pub fn clear(&mut self) {
        self.current_question.clear();
        self.accumulated_output.clear();
        self.is_generating = false;
        self.is_completed = true;
        self.phase = SessionPhase::Idle;
    }

    /// Return to the freshly constructed state.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    fn transition(&mut self, next: SessionPhase) -> Result<(), DomainError> {
        if !self.phase.can_transition_to(&next) {
            return Err(DomainError::InvalidTransition {
                from: self.phase.to_string(),
                to: next.to_string(),
            });
        }
        self.phase = next;
        Ok(())
    }
}
