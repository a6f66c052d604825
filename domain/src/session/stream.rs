//! Streaming events for inference engine output.
//!
//! [`StreamEvent`] represents individual events in a streaming generation,
//! enabling real-time display of model output as it's generated.

/// An event in a streaming engine response.
///
/// Used to bridge the engine's generation task to the session controller.
/// A closed channel is treated the same as [`StreamEvent::EndOfStream`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// A text fragment produced by the engine.
    Delta(String),
    /// The engine finished generating (the "no delta" signal).
    EndOfStream,
    /// A failure reported by the engine mid-stream.
    Error(String),
}
