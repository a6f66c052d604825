//! Raw TOML configuration data types
//!
//! These structs represent the exact structure of the TOML config file.
//! They are deserialized directly and use application types where appropriate.

mod engine;
mod log;
mod repl;
mod session;

pub use engine::FileEngineConfig;
pub use log::FileLogConfig;
pub use repl::FileReplConfig;
pub use session::FileSessionConfig;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Configuration validation errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigValidationError {
    #[error("session.timeout_seconds cannot be 0")]
    InvalidTimeout,

    #[error("session.max_response_chars cannot be 0")]
    InvalidMaxChars,

    #[error("engine.stop_marker cannot be empty")]
    EmptyStopMarker,

    #[error("engine.command cannot be empty")]
    EmptyCommand,
}

/// Complete file configuration (raw TOML structure)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    /// Inference engine process
    pub engine: FileEngineConfig,
    /// Per-turn limits and texts
    pub session: FileSessionConfig,
    /// Conversation transcript
    pub log: FileLogConfig,
    /// REPL settings
    pub repl: FileReplConfig,
}

impl FileConfig {
    /// Validate the configuration, stopping at the first problem.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.session.timeout_seconds == 0 {
            return Err(ConfigValidationError::InvalidTimeout);
        }
        if self.session.max_response_chars == 0 {
            return Err(ConfigValidationError::InvalidMaxChars);
        }
        if self.engine.stop_marker.is_empty() {
            return Err(ConfigValidationError::EmptyStopMarker);
        }
        if self.engine.command.trim().is_empty() {
            return Err(ConfigValidationError::EmptyCommand);
        }
        Ok(())
    }
}

/// Expand a leading `~/` to the home directory.
pub(crate) fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(rest);
    }
    PathBuf::from(path)
}
