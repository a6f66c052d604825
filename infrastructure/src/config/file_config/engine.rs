//! Engine configuration from TOML (`[engine]` section)

use super::expand_home;
use pocket_application::EngineConfig;
use serde::{Deserialize, Serialize};

/// Raw engine configuration from TOML
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileEngineConfig {
    /// Inference command, resolved on `PATH`
    pub command: String,
    /// Command arguments; `{prompt}` and `{model}` are substituted per turn.
    /// Without `{prompt}` the prompt is written to stdin.
    pub args: Vec<String>,
    /// Model file handed to the engine (`~` is expanded)
    pub model_path: Option<String>,
    /// Context window in tokens
    pub context_size: u32,
    /// Turn termination marker emitted by the model
    pub stop_marker: String,
    /// Whether the engine stops by itself on the marker
    pub stop_on_marker: bool,
}

impl Default for FileEngineConfig {
    fn default() -> Self {
        let engine = EngineConfig::default();
        Self {
            command: "llama-cli".to_string(),
            args: vec![
                "-m".to_string(),
                "{model}".to_string(),
                "--no-display-prompt".to_string(),
                "-p".to_string(),
                "{prompt}".to_string(),
            ],
            model_path: None,
            context_size: engine.context_size,
            stop_marker: engine.stop_marker,
            stop_on_marker: engine.stop_on_marker,
        }
    }
}

impl FileEngineConfig {
    pub fn to_engine_config(&self) -> EngineConfig {
        EngineConfig {
            context_size: self.context_size,
            stop_marker: self.stop_marker.clone(),
            stop_on_marker: self.stop_on_marker,
            model_path: self.model_path.as_deref().map(expand_home),
        }
    }
}
