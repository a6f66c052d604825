//! Application layer for pocket-chat
//!
//! This crate contains the session controller use case, the ports it drives
//! (inference engine, progress, conversation logging) and its parameters.
//! It depends only on the domain layer.

pub mod config;
pub mod ports;
pub mod use_cases;

// Re-export commonly used types
pub use config::{FallbackMessages, SessionParams};
pub use ports::{
    conversation_logger::{ConversationEvent, ConversationLogger, NoConversationLogger},
    inference_engine::{EngineConfig, EngineError, InferenceEngine, StreamHandle},
    progress::{NoProgress, TurnProgressNotifier},
};
pub use use_cases::session_controller::{SessionController, TurnRequest};
