//! Infrastructure layer for pocket-chat
//!
//! This crate contains adapters that implement the ports defined
//! in the application layer: the inference engine process, the JSONL
//! conversation logger, and configuration file loading.

pub mod config;
pub mod engine;
pub mod logging;

// Re-export commonly used types
pub use config::{
    ConfigLoader, ConfigValidationError, FileConfig, FileEngineConfig, FileLogConfig,
    FileReplConfig, FileSessionConfig,
};
pub use engine::{ProcessEngine, ProcessEngineError};
pub use logging::JsonlConversationLogger;
