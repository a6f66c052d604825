//! Turn entity and its outcome

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// How a turn was finalized.
///
/// Exactly one outcome is recorded per turn: the first path to claim the
/// turn's completion gate wins and every later path is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnOutcome {
    /// The engine emitted the termination marker, or ended its stream
    /// with non-empty output.
    MarkerTerminated,
    /// Accumulated output exceeded the response length limit.
    LengthCapped,
    /// The wall-clock limit fired first.
    TimedOut,
    /// The engine reported a failure.
    EngineError,
    /// The stream ended without producing any text.
    EmptyFallback,
    /// A newer turn, a stop request or a full reset forced this turn to end.
    Superseded,
    /// The engine never initialized; the controller is inert.
    Unavailable,
}

impl TurnOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            TurnOutcome::MarkerTerminated => "marker_terminated",
            TurnOutcome::LengthCapped => "length_capped",
            TurnOutcome::TimedOut => "timed_out",
            TurnOutcome::EngineError => "engine_error",
            TurnOutcome::EmptyFallback => "empty_fallback",
            TurnOutcome::Superseded => "superseded",
            TurnOutcome::Unavailable => "unavailable",
        }
    }

    /// Outcomes where generation was cut off before the model finished.
    pub fn is_cut_short(&self) -> bool {
        matches!(
            self,
            TurnOutcome::LengthCapped | TurnOutcome::TimedOut | TurnOutcome::Superseded
        )
    }

    /// True when the model finished on its own terms.
    pub fn is_natural(&self) -> bool {
        matches!(self, TurnOutcome::MarkerTerminated)
    }
}

impl fmt::Display for TurnOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One question/answer exchange (Entity)
///
/// Created when a request is submitted and immutable once the answer is
/// finalized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    question: String,
    answer: String,
    started_at: DateTime<Utc>,
    outcome: TurnOutcome,
}

impl Turn {
    pub fn new(
        question: impl Into<String>,
        answer: impl Into<String>,
        started_at: DateTime<Utc>,
        outcome: TurnOutcome,
    ) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
            started_at,
            outcome,
        }
    }

    pub fn question(&self) -> &str {
        &self.question
    }

    pub fn answer(&self) -> &str {
        &self.answer
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn outcome(&self) -> TurnOutcome {
        self.outcome
    }

    /// Consume the turn, keeping only the answer text.
    pub fn into_answer(self) -> String {
        self.answer
    }
}
