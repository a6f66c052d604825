//! Progress notification port
//!
//! Defines the interface for observing a turn while it streams.

use pocket_domain::Turn;

/// Callback for progress updates during a turn
///
/// Implementations live in the presentation layer and can display
/// progress in various ways (spinner, streamed text, etc.)
pub trait TurnProgressNotifier: Send + Sync {
    /// Called once generation has been requested
    fn on_turn_start(&self, question: &str);

    /// Called for each accepted text fragment
    fn on_delta(&self, _delta: &str) {}

    /// Called when the turn is finalized
    fn on_turn_complete(&self, turn: &Turn);
}

/// No-op progress notifier for when progress reporting is not needed
pub struct NoProgress;

impl TurnProgressNotifier for NoProgress {
    fn on_turn_start(&self, _question: &str) {}
    fn on_turn_complete(&self, _turn: &Turn) {}
}
