//! Per-turn completion gate.
//!
//! Every path that can end a turn (stream end, marker, length cap, timer,
//! engine error, forced abort) races to claim the gate. The first claim
//! records the outcome; later claims fail and must not finalize anything.

use pocket_domain::TurnOutcome;
use std::sync::OnceLock;
use tokio_util::sync::CancellationToken;

pub(crate) struct CompletionGate {
    outcome: OnceLock<TurnOutcome>,
    finalized: CancellationToken,
}

impl CompletionGate {
    pub(crate) fn new() -> Self {
        Self {
            outcome: OnceLock::new(),
            finalized: CancellationToken::new(),
        }
    }

    /// Check-and-set in one step. Returns true only for the winning caller.
    pub(crate) fn try_finalize(&self, outcome: TurnOutcome) -> bool {
        if self.outcome.set(outcome).is_ok() {
            self.finalized.cancel();
            true
        } else {
            false
        }
    }

    pub(crate) fn outcome(&self) -> Option<TurnOutcome> {
        self.outcome.get().copied()
    }

    pub(crate) fn is_finalized(&self) -> bool {
        self.outcome.get().is_some()
    }

    /// Resolves once any caller has claimed the gate.
    pub(crate) async fn finalized(&self) {
        self.finalized.cancelled().await
    }
}
