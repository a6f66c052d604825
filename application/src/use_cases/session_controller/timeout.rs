//! Wall-clock guard racing a turn's stream consumer.

use super::gate::CompletionGate;
use pocket_domain::TurnOutcome;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::warn;

/// Spawned timer that claims the gate with [`TurnOutcome::TimedOut`].
///
/// The timer never touches the engine. The consumer wakes on the claim and
/// halts its own generation. Dropping the guard cancels the timer.
pub(crate) struct TimeoutGuard {
    handle: JoinHandle<()>,
}

impl TimeoutGuard {
    pub(crate) fn spawn(gate: Arc<CompletionGate>, timeout: Duration) -> Self {
        let handle = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            if gate.try_finalize(TurnOutcome::TimedOut) {
                warn!("Response generation timed out after {:?}", timeout);
            }
        });
        Self { handle }
    }
}

impl Drop for TimeoutGuard {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
