//! Configuration file loading for pocket-chat
//!
//! This module handles file I/O and merging of configuration from multiple sources.
//! The priority order (highest to lowest):
//!
//! 1. `POCKET_*` environment variables
//! 2. `--config <path>` specified file
//! 3. Project root: `./pocket.toml` or `./.pocket.toml`
//! 4. XDG config: `$XDG_CONFIG_HOME/pocket-chat/config.toml`
//! 5. Default values

mod file_config;
mod loader;

pub use file_config::{
    ConfigValidationError, FileConfig, FileEngineConfig, FileLogConfig, FileReplConfig,
    FileSessionConfig,
};
pub use loader::ConfigLoader;
