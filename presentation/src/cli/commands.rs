//! CLI command definitions

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Output format for one-shot answers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Answer text only
    #[default]
    Text,
    /// Answer with the question and how the turn ended
    Full,
    /// The finalized turn as JSON
    Json,
}

/// CLI arguments for pocket-chat
#[derive(Parser, Debug)]
#[command(name = "pocket-chat")]
#[command(author, version, about = "Bounded single-turn chat with a local language model")]
#[command(long_about = r#"
pocket-chat asks a local inference engine one question at a time and keeps
every answer short and on time:

- each turn ends at the model's termination marker, the length limit
  (--max-chars) or the timeout (--timeout), whichever comes first
- the engine's cache is cleared before and after every turn
- failures come back as short fallback texts instead of errors

Configuration files are loaded from (in priority order):
1. POCKET_* environment variables (e.g. POCKET_SESSION__TIMEOUT_SECONDS=10)
2. --config <path>     Explicit config file
3. ./pocket.toml       Project-level config
4. ~/.config/pocket-chat/config.toml   Global config

Example:
  pocket-chat "What is the capital of France?"
  pocket-chat --model ~/models/gemma-2b-it.gguf --timeout 10 "Explain ownership"
  pocket-chat --chat --history-turns 2
"#)]
pub struct Cli {
    /// The question to ask (not required in chat mode)
    pub question: Option<String>,

    /// Start interactive chat mode
    #[arg(short, long)]
    pub chat: bool,

    /// Inference command to run for each turn
    #[arg(long, value_name = "CMD")]
    pub engine_command: Option<String>,

    /// Argument for the inference command (can be specified multiple times;
    /// replaces the configured arguments)
    #[arg(long = "engine-arg", value_name = "ARG", allow_hyphen_values = true)]
    pub engine_args: Vec<String>,

    /// Model file passed to the engine as {model}
    #[arg(short, long, value_name = "PATH")]
    pub model: Option<PathBuf>,

    /// Time limit per answer in seconds
    #[arg(short, long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Maximum answer length in characters
    #[arg(long, value_name = "N")]
    pub max_chars: Option<usize>,

    /// Previous turns to feed back as context in chat mode
    #[arg(long, value_name = "N")]
    pub history_turns: Option<usize>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,

    /// Verbosity level (-v = info, -vv = debug, -vvv = trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress progress indicators
    #[arg(short, long)]
    pub quiet: bool,

    /// Path to configuration file
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Disable loading of configuration files
    #[arg(long)]
    pub no_config: bool,

    /// Show configuration file locations and exit
    #[arg(long)]
    pub show_config: bool,

    /// Write diagnostic logs to this file instead of stderr
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Append the conversation transcript (JSONL) to this file
    #[arg(long, value_name = "PATH")]
    pub conversation_log: Option<PathBuf>,
}
