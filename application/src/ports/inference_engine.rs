//! Inference engine port
//!
//! Defines the interface to the on-device language model. The engine owns
//! the model, tokenizer and KV cache; this crate only starts generations,
//! consumes their output, and asks for stops and resets.

use async_trait::async_trait;
use pocket_domain::StreamEvent;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Errors that can occur during inference engine operations
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Engine unavailable: {0}")]
    Unavailable(String),

    #[error("Failed to start generation: {0}")]
    StartFailed(String),
}

/// Engine-side configuration.
///
/// `model_path` is handed to the engine explicitly at construction; nothing
/// caches it process-wide.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Context window in tokens (prompt and output combined).
    pub context_size: u32,
    /// Substring the model emits to end its turn.
    pub stop_marker: String,
    /// Whether the engine halts by itself once the marker is produced.
    pub stop_on_marker: bool,
    /// Model artifact location, if the engine needs one.
    pub model_path: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            context_size: 512,
            stop_marker: "<end_of_turn>".to_string(),
            stop_on_marker: true,
            model_path: None,
        }
    }
}

/// Handle for receiving streaming events from one generation.
///
/// Each call to [`InferenceEngine::start`] returns its own handle, so no
/// output handler is shared between turns. The handle also carries the
/// generation's own stop signal: [`cancel`](Self::cancel) halts this
/// generation and never a later one.
pub struct StreamHandle {
    pub receiver: mpsc::Receiver<StreamEvent>,
    cancel: CancellationToken,
}

impl StreamHandle {
    pub fn new(receiver: mpsc::Receiver<StreamEvent>, cancel: CancellationToken) -> Self {
        Self { receiver, cancel }
    }

    /// Create a connected sender/handle pair with a fresh stop signal.
    pub fn channel(capacity: usize) -> (mpsc::Sender<StreamEvent>, Self) {
        let (tx, rx) = mpsc::channel(capacity);
        (tx, Self::new(rx, CancellationToken::new()))
    }

    /// Stop signal the producer watches.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Ask this generation to halt. Best-effort, like [`InferenceEngine::stop`].
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Receive the next event. A closed channel reads as end-of-stream.
    pub async fn recv(&mut self) -> StreamEvent {
        self.receiver
            .recv()
            .await
            .unwrap_or(StreamEvent::EndOfStream)
    }
}

/// A stateful, non-reentrant text generation engine.
///
/// Implementations stream output through the [`StreamHandle`] returned by
/// `start`. `stop` is best-effort: deltas may still arrive afterwards and
/// consumers must tolerate them.
#[async_trait]
pub trait InferenceEngine: Send + Sync {
    /// Engine configuration (marker, context size)
    fn config(&self) -> &EngineConfig;

    /// Begin generating a response to `prompt`
    async fn start(&self, prompt: &str) -> Result<StreamHandle, EngineError>;

    /// Ask whatever generation is running to halt.
    ///
    /// Not tied to one generation; callers that may race a newer turn use
    /// [`StreamHandle::cancel`] instead.
    fn stop(&self);

    /// Drop conversational history and cached computation
    async fn reset_cache(&self);
}
